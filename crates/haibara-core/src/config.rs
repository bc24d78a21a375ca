//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! base URL, default "remember me" choice, where durable credentials live,
//! and request settings.
//!
//! Configuration is stored at `~/.config/haibara/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_ACCEPT_LANGUAGE, DEFAULT_TIMEOUT_SECS};

/// Application name used for config/data directory paths
const APP_NAME: &str = "haibara";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const BASE_API_ENV: &str = "HAIBARA_BASE_API";

const DEFAULT_BASE_URL: &str = "http://localhost:8088/api/";

/// Session tier subdirectory when it has to live under the cache dir
const SESSION_SUBDIR: &str = "session";

/// Where durable ("remember me") credentials are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub remember_me: bool,
    pub durable_backend: DurableBackend,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            remember_me: false,
            durable_backend: DurableBackend::default(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(BASE_API_ENV).ok());
    }

    fn apply_overrides(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the durable credential tier.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Directory for the session credential tier.
    ///
    /// The per-user runtime dir is emptied when the user logs out of the OS,
    /// which is the closest thing to a browser session here. Without one
    /// (ssh, cron) the per-user cache dir is used instead of the shared temp dir.
    pub fn session_dir(&self) -> PathBuf {
        match dirs::runtime_dir() {
            Some(dir) => dir.join(APP_NAME),
            None => dirs::cache_dir()
                .map(|dir| dir.join(APP_NAME).join(SESSION_SUBDIR))
                .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME)),
        }
    }
}
