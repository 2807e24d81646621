pub mod orchestrator;
pub mod simulation_errors;
pub mod simulation_model;


pub use orchestrator::*;
pub use simulation_errors::*;
pub use simulation_model::*;
