//! Application configuration.
//!
//! Loaded from a TOML file (`flight-scout.toml` by default, overridable via
//! `FLIGHT_SCOUT_CONFIG`). A missing file means defaults; a malformed file is
//! a startup error.

use crate::browser::BrowserSettings;
use crate::SearchError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Strategy selector: one facade, two ways of producing offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Render and scrape the live third-party page
    Scrape,
    /// Fabricate labeled pseudo-random offers
    Simulate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: SearchMode,
    pub browser: BrowserSettings,
    /// SQLite connection string for search history
    pub history_db: String,
    /// Fixed seed for simulation mode; omit for entropy-seeded offers
    pub simulation_seed: Option<u64>,
    /// Extra or corrected IATA → place-id entries merged over the built-in table
    pub airports: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Simulate,
            browser: BrowserSettings::default(),
            history_db: "sqlite://flight-scout.db?mode=rwc".to_string(),
            simulation_seed: None,
            airports: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self, SearchError> {
        let path =
            std::env::var("FLIGHT_SCOUT_CONFIG").unwrap_or_else(|_| "flight-scout.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, SearchError> {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), mode = ?config.mode, "Configuration loaded");
        Ok(config)
    }
}
