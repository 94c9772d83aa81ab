use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "campus-connect";
const CONFIG_FILE: &str = "config.json";

/// Default URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:17020/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampusConfig {
    /// Base URL of the remote API used by remote-backed stores
    pub api_url: String,
    /// Bearer key for the remote API (optional for local)
    pub api_key: Option<String>,
    /// SQLite file used for local persistence. Defaults to the data directory.
    pub database_path: Option<PathBuf>,
    /// Maximum number of audit trail entries kept; older ones are dropped
    pub audit_capacity: usize,
    /// Days a borrowed book may be kept before it is overdue
    pub loan_period_days: i64,
    /// Late fee charged per overdue day on return
    pub late_fee_per_day: i64,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            database_path: None,
            audit_capacity: 500,
            loan_period_days: 14,
            late_fee_per_day: 10,
        }
    }
}

impl CampusConfig {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides.
    /// Falls back to defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply `CAMPUS_*` environment variables on top of the loaded values.
    ///
    /// - `CAMPUS_API_URL`
    /// - `CAMPUS_API_KEY`
    /// - `CAMPUS_DB_PATH`
    /// - `CAMPUS_AUDIT_CAPACITY`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("CAMPUS_API_URL") {
            self.api_url = url;
        }
        if let Ok(key) = std::env::var("CAMPUS_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("CAMPUS_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(capacity) = std::env::var("CAMPUS_AUDIT_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.audit_capacity = capacity;
        }
        self
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
