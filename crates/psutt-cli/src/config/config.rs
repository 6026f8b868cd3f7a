//! `AppConfig` struct and TOML loading.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use psutt_api::timetable::DEFAULT_CONCURRENCY;
use serde::Deserialize;
use url::Url;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Portal connection settings.
    #[serde(default)]
    pub source: SourceConfig,
}

/// Portal connection settings. Every field is optional.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct SourceConfig {
    /// Portal base URL (the directory holding the timetable page).
    pub base_url: Option<String>,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
    /// Raw `Cookie` header for an authenticated student session.
    pub session_cookie: Option<String>,
    /// Minimum gap between requests, in milliseconds.
    pub min_interval_ms: Option<u64>,
    /// Week pages fetched concurrently.
    pub concurrency: Option<usize>,
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

impl SourceConfig {
    /// Parsed base URL, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid URL.
    pub fn base_url(&self) -> Result<Option<Url>> {
        self.base_url
            .as_deref()
            .map(|raw| Url::parse(raw).with_context(|| format!("invalid source.base_url: {raw}")))
            .transpose()
    }

    /// Configured request interval, if any.
    #[must_use]
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval_ms.map(Duration::from_millis)
    }

    /// Configured concurrency, or the library default.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }
}
