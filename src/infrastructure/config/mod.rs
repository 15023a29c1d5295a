//! Configuration management
//!
//! Hierarchical configuration using figment:
//! - Programmatic defaults
//! - Project YAML files under `.gignova/`
//! - `GIGNOVA_*` environment overrides
//! - Validation of the merged result

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
