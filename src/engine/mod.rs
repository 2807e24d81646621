pub mod engine_model;
pub mod engine_registry;

pub use engine_model::*;
pub use engine_registry::*;
