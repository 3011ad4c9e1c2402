//! Parsing and validation of `recast.toml` configuration files.
//!
//! This crate reads the optional project configuration file and produces a
//! strongly-typed [`RecastConfig`] covering the cache location, file
//! classification thresholds, and compiler dispatch policy.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_or_default, CONFIG_FILE};
pub use types::*;
