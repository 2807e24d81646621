pub mod params_model;

pub use params_model::*;
