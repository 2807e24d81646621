pub mod rebalance_calculator;
pub mod rebalance_model;

pub use rebalance_calculator::*;
pub use rebalance_model::*;
