use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::params::{
    Constraints, OptimizationMethod, RebalanceRules, RiskParameters, SimulationParameters,
    TaxAssumptions, TransactionCostModel,
};
use crate::portfolio::TargetAllocation;
use crate::Error;

/// Simulation defaults carried by an engine. Simulations created
/// without explicit parameters inherit these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub transaction_costs: TransactionCostModel,
    pub tax_assumptions: TaxAssumptions,
    pub risk_parameters: RiskParameters,
    pub optimization_method: OptimizationMethod,
    pub constraints: Constraints,
    pub jurisdiction: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            transaction_costs: TransactionCostModel::default(),
            tax_assumptions: TaxAssumptions::default(),
            risk_parameters: RiskParameters::default(),
            optimization_method: OptimizationMethod::ThresholdBased,
            constraints: Constraints::default(),
            jurisdiction: "US".to_string(),
        }
    }
}

impl EngineConfig {
    /// Expands the engine defaults into a full parameter set.
    pub fn default_parameters(&self) -> SimulationParameters {
        let mut params = SimulationParameters::default();
        params.transaction_costs = self.transaction_costs.clone();
        params.tax_assumptions = self.tax_assumptions.clone();
        params.tax_assumptions.jurisdiction = self.jurisdiction.clone();
        params.risk_parameters = self.risk_parameters.clone();
        params.optimization_method = self.optimization_method;
        params.constraints = self.constraints.clone();
        params
    }
}

/// Health counters. Totals are monotonic; only the active count moves
/// both ways.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_simulations: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

/// A configured simulation context owning simulations and templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub config: EngineConfig,
    pub stats: EngineStats,
    pub active_simulations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEngine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<EngineConfig>,
}

impl NewEngine {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Engine name cannot be empty".to_string(),
            )));
        }
        Ok(())
    }
}

impl From<NewEngine> for Engine {
    fn from(new: NewEngine) -> Self {
        let now = Utc::now();
        Engine {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: new.name,
            description: new.description,
            config: new.config.unwrap_or_default(),
            stats: EngineStats::default(),
            active_simulations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied as immutable value replacement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<EngineConfig>,
}

impl Engine {
    pub fn apply(&self, patch: EnginePatch) -> Engine {
        let mut updated = self.clone();
        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(description) = patch.description {
            updated.description = Some(description);
        }
        if let Some(config) = patch.config {
            updated.config = config;
        }
        updated.updated_at = Utc::now();
        updated
    }
}

/// A reusable allocation bundle: target weights, execution rules and
/// default parameters. Usage-counted; at most one default per engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub engine_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target: TargetAllocation,
    pub rules: RebalanceRules,
    pub parameters: SimulationParameters,
    pub is_default: bool,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub engine_id: String,
    pub name: String,
    pub description: Option<String>,
    pub target: TargetAllocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<RebalanceRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SimulationParameters>,
    pub is_default: bool,
}

impl NewTemplate {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Template name cannot be empty".to_string(),
            )));
        }
        self.target.validate()?;
        if let Some(params) = &self.parameters {
            params.validate()?;
        }
        Ok(())
    }
}

impl From<NewTemplate> for Template {
    fn from(new: NewTemplate) -> Self {
        let now = Utc::now();
        Template {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            engine_id: new.engine_id,
            name: new.name,
            description: new.description,
            target: new.target,
            rules: new.rules.unwrap_or_default(),
            parameters: new.parameters.unwrap_or_default(),
            is_default: new.is_default,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
