pub mod scenario_generator;
pub mod scenario_model;

pub use scenario_generator::*;
pub use scenario_model::*;
