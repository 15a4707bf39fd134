//! Configuration loading
//!
//! Hierarchical figment configuration: defaults, project YAML files and
//! `SILT_*` environment overrides, validated after extraction.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
