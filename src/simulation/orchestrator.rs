use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::analysis::{analyze_cost, analyze_performance, analyze_risk, analyze_tax};
use crate::engine::{EngineRegistry, Template};
use crate::errors::Result;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::compute_actions;
use crate::recommendation::{synthesize, RuleContext};
use crate::scenario::generate_scenarios;
use crate::Error;

use super::simulation_errors::SimulationError;
use super::simulation_model::{
    compute_summary, NewSimulation, Simulation, SimulationResults, SimulationStatus,
};

const DRAIN_POLL_MS: u64 = 10;

/// Owns the simulation lifecycle: create/run/cancel, stage sequencing
/// and cooperative cancellation. The registry is injected; the
/// orchestrator holds no global state.
///
/// Each run executes as an independent tokio task. The only state
/// shared between concurrent runs is the engine's active-simulation
/// set, which the registry serializes per engine.
pub struct SimulationOrchestrator {
    registry: Arc<EngineRegistry>,
    simulations: Arc<DashMap<String, Simulation>>,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
}

impl SimulationOrchestrator {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        SimulationOrchestrator {
            registry,
            simulations: Arc::new(DashMap::new()),
            cancel_flags: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Validates inputs and registers a pending simulation with its
    /// engine. Validation failures surface here, before the simulation
    /// ever leaves `pending`.
    pub fn create_simulation(&self, engine_id: &str, input: NewSimulation) -> Result<Simulation> {
        let engine = self.registry.get_engine(engine_id)?;

        input.portfolio.validate()?;
        for warning in input.target.validate()? {
            warn!("Simulation input for engine {engine_id}: {warning}");
        }
        let parameters = match input.parameters {
            Some(params) => params,
            None => engine.config.default_parameters(),
        };
        parameters.validate()?;

        let simulation = Simulation {
            id: uuid::Uuid::new_v4().to_string(),
            engine_id: engine_id.to_string(),
            status: SimulationStatus::Pending,
            portfolio: input.portfolio,
            target: input.target,
            parameters,
            results: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        };

        self.registry.register_simulation(engine_id, &simulation.id)?;
        self.simulations
            .insert(simulation.id.clone(), simulation.clone());
        info!(
            "Created simulation {} for engine {}",
            simulation.id, engine_id
        );
        Ok(simulation)
    }

    /// Instantiates a simulation from a stored template and bumps the
    /// template's usage count.
    pub fn create_simulation_from_template(
        &self,
        engine_id: &str,
        template_id: &str,
        portfolio: PortfolioSnapshot,
    ) -> Result<Simulation> {
        let template: Template = self.registry.get_template(template_id)?;
        if template.engine_id != engine_id {
            return Err(Error::NotFound(format!(
                "Template '{template_id}' does not belong to engine '{engine_id}'"
            )));
        }
        let simulation = self.create_simulation(
            engine_id,
            NewSimulation {
                portfolio,
                target: template.target.clone(),
                parameters: Some(template.parameters.clone()),
            },
        )?;
        self.registry.increment_template_usage(template_id)?;
        Ok(simulation)
    }

    pub fn get_simulation(&self, id: &str) -> Result<Simulation> {
        self.simulations
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| Error::NotFound(format!("Simulation '{id}'")))
    }

    pub fn list_simulations(&self) -> Vec<Simulation> {
        self.simulations.iter().map(|s| s.clone()).collect()
    }

    pub fn list_simulations_for_engine(&self, engine_id: &str) -> Vec<Simulation> {
        self.simulations
            .iter()
            .filter(|s| s.engine_id == engine_id)
            .map(|s| s.clone())
            .collect()
    }

    /// Runs the pipeline for a pending (or retried failed) simulation
    /// as an independent task and resolves with its results.
    ///
    /// Resolution mirrors the terminal state: completed runs return the
    /// results, failed runs return `SimulationError::Failed`, cancelled
    /// runs `SimulationError::Cancelled`. The same outcome is
    /// observable by polling `get_simulation`.
    pub async fn run_simulation(&self, id: &str) -> Result<SimulationResults> {
        let (running, retried) = {
            let mut entry = self
                .simulations
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("Simulation '{id}'")))?;
            let retried = entry.status == SimulationStatus::Failed;
            let mut running = entry.transition(SimulationStatus::Running)?;
            running.started_at = Some(Utc::now());
            running.error = None;
            *entry = running.clone();
            (running, retried)
        };

        let cancel = self
            .cancel_flags
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        // A cancel that raced an earlier failed run must not carry over
        // into the retry. Flags set while pending are honored as usual.
        if retried {
            cancel.store(false, Ordering::SeqCst);
        }

        let simulations = Arc::clone(&self.simulations);
        let cancel_flags = Arc::clone(&self.cancel_flags);
        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(run_pipeline(
            running,
            cancel,
            simulations,
            cancel_flags,
            registry,
        ));

        if let Err(join_error) = task.await {
            error!("Simulation {id} task aborted: {join_error}");
            self.finalize(id, SimulationStatus::Failed, None, Some(join_error.to_string()));
        }

        let finished = self.get_simulation(id)?;
        match finished.status {
            SimulationStatus::Completed => Ok(finished
                .results
                .ok_or_else(|| Error::Simulation(SimulationError::Failed {
                    id: id.to_string(),
                    message: "Completed simulation has no results".to_string(),
                }))?),
            SimulationStatus::Cancelled => Err(Error::Simulation(SimulationError::Cancelled {
                id: id.to_string(),
            })),
            other => Err(Error::Simulation(SimulationError::Failed {
                id: id.to_string(),
                message: finished
                    .error
                    .unwrap_or_else(|| format!("Simulation ended in status {other}")),
            })),
        }
    }

    /// Cooperative: sets the abort flag, which the pipeline honors at
    /// its next stage boundary. Idempotent; a no-op on terminal
    /// simulations.
    pub fn cancel_simulation(&self, id: &str) -> Result<()> {
        let simulation = self.get_simulation(id)?;
        if simulation.status.is_terminal() {
            debug!(
                "Cancel requested for simulation {id} already in terminal status {}",
                simulation.status
            );
            return Ok(());
        }
        self.cancel_flags
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .store(true, Ordering::SeqCst);
        info!("Cancellation requested for simulation {id}");
        Ok(())
    }

    /// Cancels every simulation of the engine, waits for running ones
    /// to reach a terminal state, then removes the engine. The active
    /// set is re-read on every pass, so simulations created while the
    /// drain is in progress (the engine is still registered until the
    /// drain completes) are swept up too. Simulation history stays
    /// addressable under the deleted engine's id.
    pub async fn delete_engine(&self, engine_id: &str) -> Result<()> {
        loop {
            let active = match self.registry.active_simulations(engine_id) {
                Ok(active) => active,
                Err(_) => break,
            };
            if active.is_empty() {
                break;
            }
            for simulation_id in &active {
                match self.get_simulation(simulation_id) {
                    // Pending simulations never started a task; drop
                    // them from the active set directly. Their flags
                    // stay set, so a later run cancels at the first
                    // stage boundary.
                    Ok(simulation) if simulation.status == SimulationStatus::Pending => {
                        let _ = self.cancel_simulation(simulation_id);
                        self.registry.finish_simulation(
                            engine_id,
                            simulation_id,
                            SimulationStatus::Pending,
                        );
                    }
                    // Running pipelines observe the flag at their next
                    // boundary and leave the set on their terminal
                    // transition.
                    Ok(simulation) if !simulation.status.is_terminal() => {
                        let _ = self.cancel_simulation(simulation_id);
                    }
                    // Terminal or purged records have nothing left to
                    // wait for; release their slot here.
                    _ => {
                        self.registry.finish_simulation(
                            engine_id,
                            simulation_id,
                            SimulationStatus::Pending,
                        );
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(DRAIN_POLL_MS)).await;
        }

        self.registry.remove_engine(engine_id)?;
        Ok(())
    }

    /// Explicit purge of retained history for a (typically deleted)
    /// engine. Only terminal simulations are dropped.
    pub fn purge_engine_history(&self, engine_id: &str) -> usize {
        let before = self.simulations.len();
        self.simulations
            .retain(|_, s| s.engine_id != engine_id || !s.status.is_terminal());
        before - self.simulations.len()
    }

    fn finalize(
        &self,
        id: &str,
        status: SimulationStatus,
        results: Option<SimulationResults>,
        error: Option<String>,
    ) {
        finalize_simulation(
            &self.simulations,
            &self.cancel_flags,
            &self.registry,
            id,
            status,
            results,
            error,
        );
    }
}

/// Terminal-state bookkeeping shared by the orchestrator and the
/// pipeline task: stamps end time and duration, attaches results or
/// the error, drops the cancel flag and releases the engine's
/// active-set slot. Flags of simulations that never reach a terminal
/// state (pending ones swept by an engine delete) stay in place so a
/// later run still cancels.
fn finalize_simulation(
    simulations: &DashMap<String, Simulation>,
    cancel_flags: &DashMap<String, Arc<AtomicBool>>,
    registry: &EngineRegistry,
    id: &str,
    status: SimulationStatus,
    results: Option<SimulationResults>,
    error: Option<String>,
) {
    let engine_id = {
        let Some(mut entry) = simulations.get_mut(id) else {
            return;
        };
        let Ok(mut terminal) = entry.transition(status) else {
            return;
        };
        let now = Utc::now();
        terminal.completed_at = Some(now);
        terminal.duration_ms = terminal
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64);
        terminal.results = results;
        terminal.error = error;
        *entry = terminal;
        entry.engine_id.clone()
    };
    cancel_flags.remove(id);
    registry.finish_simulation(&engine_id, id, status);
}

/// The pipeline proper: actions, the four analyzers (as independent
/// tasks), scenarios, recommendations, summary. Cancellation is
/// observed between stages only; a cancelled run discards partial
/// results.
async fn run_pipeline(
    simulation: Simulation,
    cancel: Arc<AtomicBool>,
    simulations: Arc<DashMap<String, Simulation>>,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
    registry: Arc<EngineRegistry>,
) {
    let id = simulation.id.clone();

    macro_rules! checkpoint {
        () => {
            tokio::task::yield_now().await;
            if cancel.load(Ordering::SeqCst) {
                info!("Simulation {id} cancelled at stage boundary");
                finalize_simulation(
                    &simulations,
                    &cancel_flags,
                    &registry,
                    &id,
                    SimulationStatus::Cancelled,
                    None,
                    None,
                );
                return;
            }
        };
    }

    macro_rules! stage {
        ($result:expr) => {
            match $result {
                Ok(value) => value,
                Err(err) => {
                    error!("Simulation {id} failed: {err}");
                    finalize_simulation(
                        &simulations,
                        &cancel_flags,
                        &registry,
                        &id,
                        SimulationStatus::Failed,
                        None,
                        Some(err.to_string()),
                    );
                    return;
                }
            }
        };
    }

    checkpoint!();
    let actions = stage!(compute_actions(
        &simulation.portfolio,
        &simulation.target,
        &simulation.parameters
    ));
    debug!("Simulation {id}: {} action(s) computed", actions.len());

    checkpoint!();
    // Four independent analyzers, no ordering or communication between
    // them. The summary waits for all four.
    let cost_task = {
        let (p, a, params) = (
            simulation.portfolio.clone(),
            actions.clone(),
            simulation.parameters.clone(),
        );
        tokio::spawn(async move { analyze_cost(&p, &a, &params) })
    };
    let risk_task = {
        let (p, a, params) = (
            simulation.portfolio.clone(),
            actions.clone(),
            simulation.parameters.clone(),
        );
        tokio::spawn(async move { analyze_risk(&p, &a, &params) })
    };
    let performance_task = {
        let (p, a, params) = (
            simulation.portfolio.clone(),
            actions.clone(),
            simulation.parameters.clone(),
        );
        tokio::spawn(async move { analyze_performance(&p, &a, &params) })
    };
    let tax_task = {
        let (p, a, params) = (
            simulation.portfolio.clone(),
            actions.clone(),
            simulation.parameters.clone(),
        );
        tokio::spawn(async move { analyze_tax(&p, &a, &params) })
    };

    let (cost_join, risk_join, performance_join, tax_join) =
        tokio::join!(cost_task, risk_task, performance_task, tax_task);
    let cost = stage!(stage!(cost_join.map_err(join_failure)));
    let risk = stage!(stage!(risk_join.map_err(join_failure)));
    let performance = stage!(stage!(performance_join.map_err(join_failure)));
    let tax = stage!(stage!(tax_join.map_err(join_failure)));

    checkpoint!();
    let scenarios = stage!(generate_scenarios(
        &simulation.portfolio,
        &actions,
        &simulation.parameters
    ));

    checkpoint!();
    let recommendations = synthesize(&RuleContext {
        portfolio: &simulation.portfolio,
        actions: &actions,
        cost: &cost,
        risk: &risk,
        performance: &performance,
        tax: &tax,
        scenarios: &scenarios,
    });
    let summary = compute_summary(
        &simulation.portfolio,
        &actions,
        &cost,
        &risk,
        &performance,
        &tax,
    );

    let results = SimulationResults {
        actions,
        cost_analysis: cost,
        risk_analysis: risk,
        performance_analysis: performance,
        tax_analysis: tax,
        scenarios,
        recommendations,
        summary,
    };
    info!("Simulation {id} completed");
    finalize_simulation(
        &simulations,
        &cancel_flags,
        &registry,
        &id,
        SimulationStatus::Completed,
        Some(results),
        None,
    );
}

fn join_failure(err: tokio::task::JoinError) -> Error {
    Error::Simulation(SimulationError::Failed {
        id: String::new(),
        message: format!("Analyzer task aborted: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewEngine;
    use crate::portfolio::{
        Holding, PortfolioSnapshot, SnapshotMetrics, TargetAllocation, WeightTarget,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn orchestrator_with_engine() -> (SimulationOrchestrator, String) {
        let orchestrator = SimulationOrchestrator::new(Arc::new(EngineRegistry::new()));
        let engine_id = orchestrator
            .registry()
            .create_engine(NewEngine {
                id: None,
                name: "flags".to_string(),
                description: None,
                config: None,
            })
            .unwrap()
            .id;
        (orchestrator, engine_id)
    }

    fn input(extra_target: Option<WeightTarget>) -> NewSimulation {
        let portfolio = PortfolioSnapshot::new(
            vec![Holding {
                symbol: "VTI".to_string(),
                quantity: dec!(300),
                price: dec!(100),
                weight: Decimal::ZERO,
                cost_basis: dec!(24000),
                holding_period_days: 400,
                jurisdiction: "US".to_string(),
                liquidity_score: dec!(8),
                asset_class: "equity".to_string(),
                sector: "broad".to_string(),
                geography: "north_america".to_string(),
                currency: "USD".to_string(),
            }],
            dec!(20000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap();
        let mut target = TargetAllocation::new("derisk");
        target.holdings.push(WeightTarget {
            key: "VTI".to_string(),
            target_weight: dec!(50),
            tolerance: dec!(5),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        });
        if let Some(extra) = extra_target {
            target.holdings.push(extra);
        }
        NewSimulation {
            portfolio,
            target,
            parameters: None,
        }
    }

    /// A symbol neither held nor priced fails the action calculator at
    /// run time, after creation validation has passed.
    fn failing_input() -> NewSimulation {
        input(Some(WeightTarget {
            key: "GLD".to_string(),
            target_weight: dec!(20),
            tolerance: dec!(1),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        }))
    }

    #[tokio::test]
    async fn terminal_simulations_release_their_cancel_flags() {
        let (orchestrator, engine_id) = orchestrator_with_engine();

        let cancelled = orchestrator
            .create_simulation(&engine_id, input(None))
            .unwrap();
        orchestrator.cancel_simulation(&cancelled.id).unwrap();
        assert!(orchestrator.cancel_flags.contains_key(&cancelled.id));
        let _ = orchestrator.run_simulation(&cancelled.id).await;
        assert!(!orchestrator.cancel_flags.contains_key(&cancelled.id));

        let completed = orchestrator
            .create_simulation(&engine_id, input(None))
            .unwrap();
        orchestrator.run_simulation(&completed.id).await.unwrap();
        assert!(!orchestrator.cancel_flags.contains_key(&completed.id));
    }

    #[tokio::test]
    async fn stale_cancel_does_not_leak_into_a_retry() {
        let (orchestrator, engine_id) = orchestrator_with_engine();
        let simulation = orchestrator
            .create_simulation(&engine_id, failing_input())
            .unwrap();

        let first = orchestrator.run_simulation(&simulation.id).await;
        assert!(matches!(
            first,
            Err(Error::Simulation(SimulationError::Failed { .. }))
        ));

        // A cancel request that raced the failing run leaves its flag
        // behind; the retry must fail on its own terms, not cancel.
        orchestrator.cancel_flags.insert(
            simulation.id.clone(),
            Arc::new(AtomicBool::new(true)),
        );
        let retry = orchestrator.run_simulation(&simulation.id).await;
        assert!(matches!(
            retry,
            Err(Error::Simulation(SimulationError::Failed { .. }))
        ));
        assert_eq!(
            orchestrator.get_simulation(&simulation.id).unwrap().status,
            SimulationStatus::Failed
        );
    }
}
