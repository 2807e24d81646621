use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{CostAnalysis, PerformanceAnalysis, RiskAnalysis, TaxAnalysis};
use crate::errors::Result;
use crate::params::SimulationParameters;
use crate::portfolio::{PortfolioSnapshot, TargetAllocation};
use crate::rebalance::{Priority, RebalanceAction};
use crate::recommendation::Recommendation;
use crate::scenario::ScenarioResult;
use crate::utils::decimal_serde::*;
use crate::Error;

use super::simulation_errors::SimulationError;

/// Status only moves forward: pending -> running -> one of the three
/// terminal states. Terminal simulations are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SimulationStatus::Completed | SimulationStatus::Failed | SimulationStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: SimulationStatus) -> bool {
        match self {
            SimulationStatus::Pending => matches!(next, SimulationStatus::Running),
            // A failed run may be retried.
            SimulationStatus::Failed => matches!(next, SimulationStatus::Running),
            SimulationStatus::Running => next.is_terminal(),
            SimulationStatus::Completed | SimulationStatus::Cancelled => false,
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SimulationStatus::Pending => "pending",
            SimulationStatus::Running => "running",
            SimulationStatus::Completed => "completed",
            SimulationStatus::Failed => "failed",
            SimulationStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Aggregated verdict computed from the four analyses and the action
/// list, strictly after all four analyzers return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Expected annual gain minus costs and taxes, in currency
    #[serde(with = "decimal_serde")]
    pub net_benefit: Decimal,
    /// 0..=100
    pub recommendation_score: Decimal,
    /// 0..=10, from action count and priority mix
    pub implementation_complexity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResults {
    pub actions: Vec<RebalanceAction>,
    pub cost_analysis: CostAnalysis,
    pub risk_analysis: RiskAnalysis,
    pub performance_analysis: PerformanceAnalysis,
    pub tax_analysis: TaxAnalysis,
    pub scenarios: Vec<ScenarioResult>,
    pub recommendations: Vec<Recommendation>,
    pub summary: Summary,
}

/// Inputs for a new simulation. Parameters default to the owning
/// engine's configuration when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSimulation {
    pub portfolio: PortfolioSnapshot,
    pub target: TargetAllocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SimulationParameters>,
}

/// One rebalance evaluation. Created and mutated only by the
/// orchestrator; retained in history after its engine is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: String,
    pub engine_id: String,
    pub status: SimulationStatus,
    pub portfolio: PortfolioSnapshot,
    pub target: TargetAllocation,
    pub parameters: SimulationParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<SimulationResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Simulation {
    /// Guarded status change; the only mutation path for `status`.
    pub fn transition(&self, next: SimulationStatus) -> Result<Simulation> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Simulation(SimulationError::InvalidTransition {
                from: self.status,
                to: next,
            }));
        }
        let mut updated = self.clone();
        updated.status = next;
        Ok(updated)
    }
}

/// Net benefit, a 0-100 recommendation score and a 0-10 complexity
/// figure from the analyzer outputs plus the action list.
pub fn compute_summary(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    cost: &CostAnalysis,
    risk: &RiskAnalysis,
    performance: &PerformanceAnalysis,
    tax: &TaxAnalysis,
) -> Summary {
    let expected_gain =
        performance.improvement.annualized_return * portfolio.total_value;
    let net_benefit = expected_gain - cost.total_cost - tax.total_estimated_tax;

    let benefit_ratio = if portfolio.total_value.is_zero() {
        Decimal::ZERO
    } else {
        net_benefit / portfolio.total_value
    };
    // 50 is neutral; each 10bp of net benefit moves the score a point,
    // risk reduction adds up to 10.
    let risk_component = (-performance.improvement.volatility * dec!(100)).min(dec!(10));
    let score = dec!(50) + benefit_ratio * dec!(1000) + risk_component;
    let recommendation_score = score.clamp(Decimal::ZERO, dec!(100));

    let high_count = actions
        .iter()
        .filter(|a| a.priority == Priority::High)
        .count();
    let complexity = Decimal::from(actions.len()) * dec!(0.5)
        + Decimal::from(high_count)
        + risk.risk_budget_utilization.min(Decimal::ONE);
    let implementation_complexity = complexity.min(dec!(10));

    Summary {
        net_benefit,
        recommendation_score,
        implementation_complexity,
    }
}
