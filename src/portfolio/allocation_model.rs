use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ALLOCATION_SUM_SLACK;
use crate::errors::{Result, ValidationError};
use crate::Error;

/// One target weight with its rebalance band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTarget {
    /// Symbol, asset class, sector or geography name depending on scope
    pub key: String,
    pub target_weight: Decimal,
    /// Allowed drift (in weight points) before an action triggers
    pub tolerance: Decimal,
    pub min_weight: Decimal,
    pub max_weight: Decimal,
    pub priority: u32,
}

impl WeightTarget {
    fn validate(&self, scope: &str) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(format!(
                "{scope}.key"
            ))));
        }
        for weight in [self.target_weight, self.min_weight, self.max_weight] {
            if weight < Decimal::ZERO || weight > dec!(100) {
                return Err(Error::Validation(ValidationError::WeightOutOfRange {
                    key: format!("{scope}:{}", self.key),
                    weight: weight.to_string(),
                }));
            }
        }
        if self.min_weight > self.max_weight {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "{scope}:{}: minWeight exceeds maxWeight",
                self.key
            ))));
        }
        if self.tolerance < Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "{scope}:{}: tolerance cannot be negative",
                self.key
            ))));
        }
        Ok(())
    }
}

/// Desired weight distribution at asset-class, sector, geography and
/// individual-holding granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAllocation {
    pub id: String,
    pub name: String,
    pub asset_classes: Vec<WeightTarget>,
    pub sectors: Vec<WeightTarget>,
    pub geographies: Vec<WeightTarget>,
    pub holdings: Vec<WeightTarget>,
    /// Allowed deviation of asset-class weights from 100%; defaults to
    /// the crate-wide slack when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_slack: Option<Decimal>,
}

impl TargetAllocation {
    pub fn new(name: &str) -> Self {
        TargetAllocation {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            asset_classes: Vec::new(),
            sectors: Vec::new(),
            geographies: Vec::new(),
            holdings: Vec::new(),
            sum_slack: None,
        }
    }

    /// Hard errors fail the call; asset-class weights summing away from
    /// 100% is a warning, not an error.
    pub fn validate(&self) -> Result<Vec<String>> {
        for (scope, targets) in [
            ("assetClass", &self.asset_classes),
            ("sector", &self.sectors),
            ("geography", &self.geographies),
            ("holding", &self.holdings),
        ] {
            for target in targets {
                target.validate(scope)?;
            }
        }

        let mut warnings = Vec::new();
        if !self.asset_classes.is_empty() {
            let sum: Decimal = self.asset_classes.iter().map(|t| t.target_weight).sum();
            let slack = self.sum_slack.unwrap_or(DEFAULT_ALLOCATION_SUM_SLACK);
            if (sum - dec!(100)).abs() > slack {
                warnings.push(format!(
                    "Asset-class target weights sum to {:.2}%, expected 100% +/- {}%",
                    sum, slack
                ));
            }
        }
        Ok(warnings)
    }

    pub fn holding_target(&self, symbol: &str) -> Option<&WeightTarget> {
        self.holdings.iter().find(|t| t.key == symbol)
    }
}
