use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::decimal_serde::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, high first. Stable sorts on this key keep discovery
    /// order within a tier.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapitalGainsType {
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxImplication {
    #[serde(with = "decimal_serde")]
    pub estimated_tax: Decimal,
    #[serde(with = "decimal_serde")]
    pub capital_gain: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_gains_type: Option<CapitalGainsType>,
    pub loss_harvesting: bool,
    pub gain_deferral: bool,
}

impl TaxImplication {
    /// Buys always report zero tax effect.
    pub fn none() -> Self {
        TaxImplication {
            estimated_tax: Decimal::ZERO,
            capital_gain: Decimal::ZERO,
            capital_gains_type: None,
            loss_harvesting: false,
            gain_deferral: false,
        }
    }
}

/// One computed buy/sell instruction. Derived from a snapshot and a
/// target allocation; never persisted independently of its simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceAction {
    pub symbol: String,
    pub side: TradeSide,
    #[serde(with = "decimal_serde")]
    pub current_quantity: Decimal,
    #[serde(with = "decimal_serde")]
    pub target_quantity: Decimal,
    #[serde(with = "decimal_serde")]
    pub change_quantity: Decimal,
    #[serde(with = "decimal_serde")]
    pub current_value: Decimal,
    #[serde(with = "decimal_serde")]
    pub target_value: Decimal,
    #[serde(with = "decimal_serde")]
    pub change_value: Decimal,
    #[serde(with = "decimal_serde")]
    pub current_weight: Decimal,
    #[serde(with = "decimal_serde")]
    pub target_weight: Decimal,
    /// currentWeight - targetWeight, in weight points
    #[serde(with = "decimal_serde")]
    pub drift: Decimal,
    #[serde(with = "decimal_serde")]
    pub transaction_cost: Decimal,
    #[serde(with = "decimal_serde")]
    pub market_impact: Decimal,
    pub tax_implications: TaxImplication,
    pub suggested_execution_date: DateTime<Utc>,
    pub priority: Priority,
}
