pub mod allocation_model;
pub mod portfolio_model;

pub use allocation_model::*;
pub use portfolio_model::*;
