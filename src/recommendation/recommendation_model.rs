use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rebalance::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationType {
    ExecutionTiming,
    TaxOptimization,
    CostEfficiency,
    RiskReduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Timeframe {
    Immediate,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

/// Expected effect of acting on the recommendation, as fractions of
/// portfolio value (cost, risk) or return points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedImpact {
    pub cost: Decimal,
    pub risk: Decimal,
    #[serde(rename = "return")]
    pub return_impact: Decimal,
}

/// One human-actionable recommendation. Recommendations are independent
/// of each other; ranking is by priority then confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub expected_impact: ExpectedImpact,
    pub implementation_steps: Vec<String>,
    pub priority: Priority,
    pub timeframe: Timeframe,
    /// 0..=1
    pub confidence: Decimal,
}
