pub mod recommendation_model;
pub mod synthesizer;

pub use recommendation_model::*;
pub use synthesizer::*;
