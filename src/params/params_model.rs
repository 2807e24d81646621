use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::DEFAULT_LONG_TERM_THRESHOLD_DAYS;
use crate::errors::{Result, ValidationError};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RebalanceFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptimizationMethod {
    ThresholdBased,
    MeanVariance,
    MinimumVolatility,
    RiskParity,
}

/// Pairwise correlation coefficient between two symbols.
/// Lookup is symmetric; only one direction needs to be configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEntry {
    pub symbol_a: String,
    pub symbol_b: String,
    pub coefficient: Decimal,
}

/// Forward-looking market assumptions. Returns and volatilities are
/// annualized fractions (0.07 = 7%), keyed by symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAssumptions {
    pub risk_free_rate: Decimal,
    pub expected_returns: HashMap<String, Decimal>,
    pub volatilities: HashMap<String, Decimal>,
    pub correlations: Vec<CorrelationEntry>,
    /// Prices for symbols that are in the target but not currently held.
    pub reference_prices: HashMap<String, Decimal>,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        MarketAssumptions {
            risk_free_rate: dec!(0.03),
            expected_returns: HashMap::new(),
            volatilities: HashMap::new(),
            correlations: Vec::new(),
            reference_prices: HashMap::new(),
        }
    }
}

impl MarketAssumptions {
    pub fn correlation(&self, a: &str, b: &str) -> Option<Decimal> {
        if a == b {
            return Some(Decimal::ONE);
        }
        self.correlations
            .iter()
            .find(|c| {
                (c.symbol_a == a && c.symbol_b == b) || (c.symbol_a == b && c.symbol_b == a)
            })
            .map(|c| c.coefficient)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCostModel {
    pub fixed_cost: Decimal,
    pub variable_rate: Decimal,
    pub market_impact_coefficient: Decimal,
    /// Ratios splitting total cost into reporting buckets; the remainder
    /// after commissions + fees + spread is bucketed as "other".
    pub commission_ratio: Decimal,
    pub fees_ratio: Decimal,
    pub spread_ratio: Decimal,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        TransactionCostModel {
            fixed_cost: dec!(5),
            variable_rate: dec!(0.001),
            market_impact_coefficient: dec!(0.0005),
            commission_ratio: dec!(0.5),
            fees_ratio: dec!(0.2),
            spread_ratio: dec!(0.2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxAssumptions {
    pub short_term_rate: Decimal,
    pub long_term_rate: Decimal,
    pub income_rate: Decimal,
    pub long_term_threshold_days: i64,
    pub jurisdiction: String,
}

impl Default for TaxAssumptions {
    fn default() -> Self {
        TaxAssumptions {
            short_term_rate: dec!(0.37),
            long_term_rate: dec!(0.20),
            income_rate: dec!(0.30),
            long_term_threshold_days: DEFAULT_LONG_TERM_THRESHOLD_DAYS,
            jurisdiction: "US".to_string(),
        }
    }
}

/// A named market regime used for stress testing and custom scenarios.
/// `return_shock` is an additive shift to expected returns,
/// `volatility_multiplier` scales configured volatilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressScenario {
    pub name: String,
    pub probability: Decimal,
    pub return_shock: Decimal,
    pub volatility_multiplier: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameters {
    /// e.g. 0.95 for 95% VaR
    pub confidence_level: Decimal,
    pub monte_carlo_samples: u32,
    pub stress_test_scenarios: Vec<StressScenario>,
    /// Annualized volatility budget for the portfolio
    pub risk_budget: Decimal,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            confidence_level: dec!(0.95),
            monte_carlo_samples: 1000,
            stress_test_scenarios: Vec::new(),
            risk_budget: dec!(0.15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub min_position_weight: Decimal,
    pub max_position_weight: Decimal,
    /// Maximum fraction of portfolio value traded in one rebalance
    pub max_turnover: Decimal,
    pub min_cash_weight: Decimal,
    pub max_cash_weight: Decimal,
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            min_position_weight: Decimal::ZERO,
            max_position_weight: dec!(100),
            max_turnover: Decimal::ONE,
            min_cash_weight: Decimal::ZERO,
            max_cash_weight: dec!(100),
        }
    }
}

/// Execution policy bundled with a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRules {
    pub frequency: RebalanceFrequency,
    pub drift_threshold: Decimal,
    pub min_trade_value: Decimal,
}

impl Default for RebalanceRules {
    fn default() -> Self {
        RebalanceRules {
            frequency: RebalanceFrequency::Quarterly,
            drift_threshold: dec!(5),
            min_trade_value: Decimal::ZERO,
        }
    }
}

/// The full set of assumptions governing one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub time_horizon_years: Decimal,
    pub rebalance_frequency: RebalanceFrequency,
    pub market_assumptions: MarketAssumptions,
    pub transaction_costs: TransactionCostModel,
    pub tax_assumptions: TaxAssumptions,
    pub risk_parameters: RiskParameters,
    pub optimization_method: OptimizationMethod,
    pub constraints: Constraints,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        SimulationParameters {
            time_horizon_years: dec!(5),
            rebalance_frequency: RebalanceFrequency::Quarterly,
            market_assumptions: MarketAssumptions::default(),
            transaction_costs: TransactionCostModel::default(),
            tax_assumptions: TaxAssumptions::default(),
            risk_parameters: RiskParameters::default(),
            optimization_method: OptimizationMethod::ThresholdBased,
            constraints: Constraints::default(),
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<()> {
        if self.time_horizon_years <= Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Time horizon must be positive".to_string(),
            )));
        }
        let confidence = self.risk_parameters.confidence_level;
        if confidence <= Decimal::ZERO || confidence >= Decimal::ONE {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Confidence level must be strictly between 0 and 1, got {}",
                confidence
            ))));
        }
        if self.tax_assumptions.long_term_threshold_days <= 0 {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Long-term threshold must be a positive number of days".to_string(),
            )));
        }
        for rate in [
            self.tax_assumptions.short_term_rate,
            self.tax_assumptions.long_term_rate,
            self.tax_assumptions.income_rate,
        ] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "Tax rates must be between 0 and 1, got {}",
                    rate
                ))));
            }
        }
        for scenario in &self.risk_parameters.stress_test_scenarios {
            if scenario.probability < Decimal::ZERO || scenario.probability > Decimal::ONE {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "Scenario '{}' probability must be between 0 and 1",
                    scenario.name
                ))));
            }
            if scenario.volatility_multiplier < Decimal::ZERO {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "Scenario '{}' volatility multiplier cannot be negative",
                    scenario.name
                ))));
            }
        }
        if self.transaction_costs.variable_rate < Decimal::ZERO
            || self.transaction_costs.fixed_cost < Decimal::ZERO
        {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Transaction costs cannot be negative".to_string(),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        assert!(SimulationParameters::default().validate().is_ok());
    }

    #[test]
    fn rejects_confidence_level_of_one() {
        let mut params = SimulationParameters::default();
        params.risk_parameters.confidence_level = Decimal::ONE;
        assert!(matches!(
            params.validate(),
            Err(Error::Validation(ValidationError::InvalidInput(_)))
        ));
    }

    #[test]
    fn correlation_lookup_is_symmetric() {
        let mut assumptions = MarketAssumptions::default();
        assumptions.correlations.push(CorrelationEntry {
            symbol_a: "VTI".to_string(),
            symbol_b: "BND".to_string(),
            coefficient: dec!(-0.1),
        });
        assert_eq!(assumptions.correlation("BND", "VTI"), Some(dec!(-0.1)));
        assert_eq!(assumptions.correlation("VTI", "VTI"), Some(Decimal::ONE));
        assert_eq!(assumptions.correlation("VTI", "GLD"), None);
    }
}
