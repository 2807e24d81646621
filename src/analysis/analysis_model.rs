use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::decimal_serde::*;

/// Full performance metric set. Returns, volatility, drawdown and VaR
/// figures are fractions of portfolio value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_return: Decimal,
    pub annualized_return: Decimal,
    pub volatility: Decimal,
    pub sharpe_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub value_at_risk: Decimal,
    pub conditional_value_at_risk: Decimal,
    pub beta: Decimal,
    pub information_ratio: Decimal,
    pub tracking_error: Decimal,
    pub calmar_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub treynor_ratio: Decimal,
}

impl PerformanceMetrics {
    /// Element-wise `after - before`.
    pub fn improvement(after: &Self, before: &Self) -> Self {
        PerformanceMetrics {
            total_return: after.total_return - before.total_return,
            annualized_return: after.annualized_return - before.annualized_return,
            volatility: after.volatility - before.volatility,
            sharpe_ratio: after.sharpe_ratio - before.sharpe_ratio,
            max_drawdown: after.max_drawdown - before.max_drawdown,
            value_at_risk: after.value_at_risk - before.value_at_risk,
            conditional_value_at_risk: after.conditional_value_at_risk
                - before.conditional_value_at_risk,
            beta: after.beta - before.beta,
            information_ratio: after.information_ratio - before.information_ratio,
            tracking_error: after.tracking_error - before.tracking_error,
            calmar_ratio: after.calmar_ratio - before.calmar_ratio,
            sortino_ratio: after.sortino_ratio - before.sortino_ratio,
            treynor_ratio: after.treynor_ratio - before.treynor_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub before: PerformanceMetrics,
    pub after: PerformanceMetrics,
    pub improvement: PerformanceMetrics,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    #[serde(with = "decimal_serde")]
    pub commissions: Decimal,
    #[serde(with = "decimal_serde")]
    pub fees: Decimal,
    #[serde(with = "decimal_serde")]
    pub spread: Decimal,
    #[serde(with = "decimal_serde")]
    pub other: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysis {
    #[serde(with = "decimal_serde")]
    pub total_transaction_cost: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_market_impact: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_cost: Decimal,
    /// Total cost as a fraction of portfolio value
    pub cost_ratio: Decimal,
    pub breakdown: CostBreakdown,
    /// Months until the expected incremental return pays for the
    /// rebalance; zero when the trade never breaks even.
    pub break_even_months: Decimal,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRisk {
    pub total_risk: Decimal,
    pub systematic_risk: Decimal,
    pub specific_risk: Decimal,
    pub concentration_risk: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationSummary {
    pub top_holding_symbol: String,
    pub top_holding_weight: Decimal,
    pub by_sector: HashMap<String, Decimal>,
    pub by_geography: HashMap<String, Decimal>,
    pub by_currency: HashMap<String, Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSummary {
    pub average: Decimal,
    pub highest: Decimal,
    pub lowest: Decimal,
    pub pair_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAttribution {
    pub equity: Decimal,
    pub bond: Decimal,
    pub currency: Decimal,
    pub specific: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTestResult {
    pub scenario: String,
    pub probability: Decimal,
    /// Return impact under the scenario, as a fraction (signed)
    pub impact: Decimal,
    pub confidence: Decimal,
    #[serde(with = "decimal_serde")]
    pub expected_loss: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub portfolio_risk: PortfolioRisk,
    pub concentration: ConcentrationSummary,
    pub correlation_summary: CorrelationSummary,
    pub attribution: RiskAttribution,
    pub stress_tests: Vec<StressTestResult>,
    /// usedRisk / totalRiskBudget
    pub risk_budget_utilization: Decimal,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxAnalysis {
    #[serde(with = "decimal_serde")]
    pub total_estimated_tax: Decimal,
    #[serde(with = "decimal_serde")]
    pub capital_gains_tax: Decimal,
    #[serde(with = "decimal_serde")]
    pub income_tax: Decimal,
    /// grossReturn - taxLiability / portfolioValue
    pub after_tax_return: Decimal,
    pub loss_harvesting_candidates: Vec<String>,
    pub gain_deferral_candidates: Vec<String>,
    pub jurisdiction_considerations: Vec<String>,
    pub warnings: Vec<String>,
}
