use dashmap::DashMap;
use log::{debug, info};

use crate::errors::Result;
use crate::simulation::SimulationStatus;
use crate::Error;

use super::engine_model::{Engine, EnginePatch, NewEngine, NewTemplate, Template};

/// In-memory store for engines and templates. Passed by reference to
/// the orchestrator; no process-wide global state. Entry-level locking
/// makes active-set updates atomic per engine.
#[derive(Default)]
pub struct EngineRegistry {
    engines: DashMap<String, Engine>,
    templates: DashMap<String, Template>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        EngineRegistry::default()
    }

    pub fn create_engine(&self, new: NewEngine) -> Result<Engine> {
        new.validate()?;
        let engine: Engine = new.into();
        info!("Created engine '{}' ({})", engine.name, engine.id);
        self.engines.insert(engine.id.clone(), engine.clone());
        Ok(engine)
    }

    pub fn get_engine(&self, id: &str) -> Result<Engine> {
        self.engines
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::NotFound(format!("Engine '{id}'")))
    }

    pub fn list_engines(&self) -> Vec<Engine> {
        self.engines.iter().map(|e| e.clone()).collect()
    }

    /// Immutable value replacement; concurrent readers see either the
    /// old or the new engine record, never a partial update.
    pub fn update_engine(&self, id: &str, patch: EnginePatch) -> Result<Engine> {
        let mut entry = self
            .engines
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Engine '{id}'")))?;
        let updated = entry.apply(patch);
        *entry = updated.clone();
        Ok(updated)
    }

    /// Removes the engine and its templates. Simulation history is not
    /// touched here; the orchestrator retains it under the engine id.
    pub fn remove_engine(&self, id: &str) -> Result<Engine> {
        let (_, engine) = self
            .engines
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("Engine '{id}'")))?;
        self.templates.retain(|_, t| t.engine_id != id);
        info!("Removed engine '{}' ({})", engine.name, engine.id);
        Ok(engine)
    }

    /// Registers a new simulation in the engine's active set and bumps
    /// the monotonic total.
    pub fn register_simulation(&self, engine_id: &str, simulation_id: &str) -> Result<()> {
        let mut entry = self
            .engines
            .get_mut(engine_id)
            .ok_or_else(|| Error::NotFound(format!("Engine '{engine_id}'")))?;
        entry.active_simulations.push(simulation_id.to_string());
        entry.stats.total_simulations += 1;
        debug!(
            "Registered simulation {} with engine {} ({} active)",
            simulation_id,
            engine_id,
            entry.active_simulations.len()
        );
        Ok(())
    }

    /// Removes a simulation from the active set on a terminal
    /// transition and bumps the matching counter. A missing engine is
    /// fine: the engine may have been deleted while its simulations
    /// wound down.
    pub fn finish_simulation(
        &self,
        engine_id: &str,
        simulation_id: &str,
        status: SimulationStatus,
    ) {
        if let Some(mut entry) = self.engines.get_mut(engine_id) {
            entry.active_simulations.retain(|id| id != simulation_id);
            match status {
                SimulationStatus::Completed => entry.stats.completed += 1,
                SimulationStatus::Failed => entry.stats.failed += 1,
                SimulationStatus::Cancelled => entry.stats.cancelled += 1,
                _ => {}
            }
        }
    }

    pub fn active_simulations(&self, engine_id: &str) -> Result<Vec<String>> {
        Ok(self.get_engine(engine_id)?.active_simulations)
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Templates must name an existing engine; marking one default
    /// clears the previous default for that engine.
    pub fn create_template(&self, new: NewTemplate) -> Result<Template> {
        new.validate()?;
        self.get_engine(&new.engine_id)?;
        let template: Template = new.into();
        if template.is_default {
            self.clear_default(&template.engine_id);
        }
        self.templates
            .insert(template.id.clone(), template.clone());
        Ok(template)
    }

    pub fn get_template(&self, id: &str) -> Result<Template> {
        self.templates
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| Error::NotFound(format!("Template '{id}'")))
    }

    pub fn list_templates(&self) -> Vec<Template> {
        self.templates.iter().map(|t| t.clone()).collect()
    }

    pub fn list_templates_for_engine(&self, engine_id: &str) -> Vec<Template> {
        self.templates
            .iter()
            .filter(|t| t.engine_id == engine_id)
            .map(|t| t.clone())
            .collect()
    }

    pub fn set_default_template(&self, id: &str) -> Result<Template> {
        let engine_id = self.get_template(id)?.engine_id;
        self.clear_default(&engine_id);
        let mut entry = self
            .templates
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Template '{id}'")))?;
        entry.is_default = true;
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    /// Monotonic; returns the new count.
    pub fn increment_template_usage(&self, id: &str) -> Result<u64> {
        let mut entry = self
            .templates
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Template '{id}'")))?;
        entry.usage_count += 1;
        Ok(entry.usage_count)
    }

    fn clear_default(&self, engine_id: &str) {
        for mut template in self.templates.iter_mut() {
            if template.engine_id == engine_id && template.is_default {
                template.is_default = false;
            }
        }
    }
}
