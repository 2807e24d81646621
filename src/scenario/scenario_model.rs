use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analysis::{PerformanceMetrics, PortfolioRisk};

/// One probability-weighted market regime evaluated for the proposed
/// rebalance. Probabilities across scenarios need not sum to 1;
/// consumers normalize if they need a distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub regime: String,
    pub probability: Decimal,
    pub performance: PerformanceMetrics,
    pub risk: PortfolioRisk,
}
