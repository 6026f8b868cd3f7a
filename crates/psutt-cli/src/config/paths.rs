//! Config and data file resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application directory name under the XDG-style base directories.
const APP_DIR: &str = "psutt";

/// Resolves the config file path.
///
/// - If `dir` is `Some`, returns `{dir}/config.toml`.
/// - Otherwise returns `~/.config/psutt/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when `dir` is `None`).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join("config.toml"));
    }
    Ok(home()?.join(".config").join(APP_DIR).join("config.toml"))
}

/// Resolves the persisted timetable path.
///
/// - If `dir` is `Some`, returns `{dir}/timetable.xml`.
/// - Otherwise returns `~/.local/share/psutt/timetable.xml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when `dir` is `None`).
pub fn resolve_snapshot_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join("timetable.xml"));
    }
    Ok(home()?
        .join(".local")
        .join("share")
        .join(APP_DIR)
        .join("timetable.xml"))
}

fn home() -> Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .context("HOME environment variable is not set")
}
