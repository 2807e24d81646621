use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::DECIMAL_PRECISION;
use crate::errors::{Result, ValidationError};
use crate::utils::decimal_serde::*;
use crate::Error;

/// One position in a snapshot. Weight is a percentage of total
/// portfolio value; liquidity score is on a 0..=10 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    #[serde(with = "decimal_serde")]
    pub quantity: Decimal,
    #[serde(with = "decimal_serde")]
    pub price: Decimal,
    #[serde(with = "decimal_serde")]
    pub weight: Decimal,
    #[serde(with = "decimal_serde")]
    pub cost_basis: Decimal,
    pub holding_period_days: i64,
    pub jurisdiction: String,
    #[serde(with = "decimal_serde")]
    pub liquidity_score: Decimal,
    pub asset_class: String,
    pub sector: String,
    pub geography: String,
    pub currency: String,
}

impl Holding {
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// Precomputed portfolio-level metrics carried on the snapshot.
/// Returns and volatility are annualized fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub expected_return: Decimal,
    pub volatility: Decimal,
    pub beta: Decimal,
}

impl Default for SnapshotMetrics {
    fn default() -> Self {
        SnapshotMetrics {
            expected_return: dec!(0.06),
            volatility: dec!(0.12),
            beta: Decimal::ONE,
        }
    }
}

/// Point-in-time view of a portfolio. Immutable once constructed;
/// represents a fact, not a live object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub id: String,
    pub holdings: Vec<Holding>,
    #[serde(with = "decimal_serde")]
    pub total_value: Decimal,
    #[serde(with = "decimal_serde")]
    pub cash_balance: Decimal,
    pub metrics: SnapshotMetrics,
    pub as_of: DateTime<Utc>,
}

impl PortfolioSnapshot {
    /// Builds a snapshot from raw holdings, deriving total value and
    /// per-holding weights from quantities and prices.
    pub fn new(
        holdings: Vec<Holding>,
        cash_balance: Decimal,
        metrics: SnapshotMetrics,
        as_of: DateTime<Utc>,
    ) -> Result<Self> {
        let securities_value: Decimal = holdings.iter().map(|h| h.market_value()).sum();
        let total_value = securities_value + cash_balance;

        let mut weighted = holdings;
        if total_value > Decimal::ZERO {
            for holding in weighted.iter_mut() {
                holding.weight = (holding.market_value() / total_value * dec!(100))
                    .round_dp(DECIMAL_PRECISION);
            }
        }

        let snapshot = PortfolioSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            holdings: weighted,
            total_value,
            cash_balance,
            metrics,
            as_of,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Structural validation. A snapshot that fails here is malformed
    /// input and aborts the pipeline stage that received it.
    pub fn validate(&self) -> Result<()> {
        if self.total_value <= Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Portfolio total value must be positive".to_string(),
            )));
        }
        if self.cash_balance < Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Cash balance cannot be negative".to_string(),
            )));
        }
        for holding in &self.holdings {
            if holding.symbol.trim().is_empty() {
                return Err(Error::Validation(ValidationError::MissingField(
                    "holding.symbol".to_string(),
                )));
            }
            if holding.quantity < Decimal::ZERO || holding.price < Decimal::ZERO {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "Holding '{}' has a negative quantity or price",
                    holding.symbol
                ))));
            }
        }
        Ok(())
    }

    /// Current weight per symbol, as a percentage of total value.
    pub fn current_weights(&self) -> HashMap<String, Decimal> {
        self.holdings
            .iter()
            .map(|h| {
                let weight = if self.total_value.is_zero() {
                    Decimal::ZERO
                } else {
                    h.market_value() / self.total_value * dec!(100)
                };
                (h.symbol.clone(), weight)
            })
            .collect()
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, quantity: Decimal, price: Decimal) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            quantity,
            price,
            weight: Decimal::ZERO,
            cost_basis: quantity * price,
            holding_period_days: 100,
            jurisdiction: "US".to_string(),
            liquidity_score: dec!(8),
            asset_class: "equity".to_string(),
            sector: "technology".to_string(),
            geography: "north_america".to_string(),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn new_derives_total_value_and_weights() {
        let snapshot = PortfolioSnapshot::new(
            vec![
                holding("AAPL", dec!(100), dec!(150)),
                holding("BND", dec!(50), dec!(100)),
            ],
            dec!(5000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(snapshot.total_value, dec!(25000));
        let weights = snapshot.current_weights();
        assert_eq!(weights["AAPL"], dec!(60));
        assert_eq!(weights["BND"], dec!(20));
    }

    #[test]
    fn rejects_empty_portfolio() {
        let result = PortfolioSnapshot::new(
            vec![],
            Decimal::ZERO,
            SnapshotMetrics::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_negative_quantity() {
        let result = PortfolioSnapshot::new(
            vec![holding("AAPL", dec!(-10), dec!(150))],
            dec!(10000),
            SnapshotMetrics::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
