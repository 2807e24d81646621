use thiserror::Error;

use super::simulation_model::SimulationStatus;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Simulation '{id}' failed: {message}")]
    Failed { id: String, message: String },

    /// A deliberate terminal state, reported distinctly from `Failed`.
    #[error("Simulation '{id}' was cancelled")]
    Cancelled { id: String },

    #[error("Illegal simulation status transition from {from} to {to}")]
    InvalidTransition {
        from: SimulationStatus,
        to: SimulationStatus,
    },
}
