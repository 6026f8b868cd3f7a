//! Application configuration module.
//!
//! Reads the optional TOML config file describing where and how the
//! timetable portal is fetched, and resolves on-disk locations.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, SourceConfig};
pub use paths::{resolve_config_path, resolve_snapshot_path};
