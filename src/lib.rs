pub mod analysis;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod params;
pub mod portfolio;
pub mod rebalance;
pub mod recommendation;
pub mod scenario;
pub mod simulation;
pub mod utils;

pub use errors::{Error, Result};

pub use engine::*;
pub use simulation::*;
