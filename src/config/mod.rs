//! Pipeline configuration
//!
//! `PipelineConfig` with a fluent builder, getters, JSON file loading and
//! helpers that construct the shared resilience components.

pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

pub use builder::PipelineConfigBuilder;
pub use types::PipelineConfig;
