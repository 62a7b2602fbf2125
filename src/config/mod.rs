// src/config/mod.rs

//! Pipeline file loading, parsing and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, DefaultSection, FunctionConfig, PipelineSection};
pub use validate::validate_config;
