//! Client configuration management.
//!
//! Configuration is stored at `~/.config/sembra/config.json`. The base URL
//! and request timeout can be overridden through the environment
//! (`SEMBRA_API_URL`, `SEMBRA_TIMEOUT_MS`); a `.env` file in the working
//! directory is honored when present.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "sembra";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL used when neither the config file nor the environment sets one.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Last email used to log in, kept so the login screen can prefill it.
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            last_email: None,
        }
    }
}

impl Config {
    /// Load configuration: config file first, then environment overrides.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment wins over the config file for the two network knobs.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SEMBRA_API_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(ms) = std::env::var("SEMBRA_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.timeout_ms = ms;
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
