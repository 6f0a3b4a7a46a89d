//! Configuration management for skytrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_AIRPORTS_BASE, DEFAULT_STATUS_BASE};
use crate::cache::DEFAULT_CAPACITY;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "skytrack";

/// Default cache database file name.
const CACHE_FILE_NAME: &str = "snapshots.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SKYTRACK_`)
/// 2. TOML config file at `~/.config/skytrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API configuration.
    pub api: ApiConfig,
    /// Snapshot cache configuration.
    pub cache: CacheConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the flight-status API.
    pub status_url: String,
    /// Base URL of the flights-by-airport / track API.
    pub airports_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// API key for the flight-status API.
    ///
    /// Usually left unset here and stored via `skytrk auth set` instead;
    /// a value here takes precedence over the credential store.
    pub key: Option<String>,
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the cache database file.
    /// Defaults to `~/.local/share/skytrack/snapshots.db`
    pub path: Option<PathBuf>,
    /// Maximum number of flights retained before least-recently-used
    /// eviction.
    pub capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            status_url: DEFAULT_STATUS_BASE.to_string(),
            airports_url: DEFAULT_AIRPORTS_BASE.to_string(),
            timeout_secs: 30,
            key: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None, // Will be resolved to default at runtime
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `SKYTRACK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("SKYTRACK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.api.status_url.is_empty() || self.api.airports_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "API base URLs must not be empty".to_string(),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.cache.capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "cache capacity must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Get the cache database path, resolving defaults if not set.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CACHE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}
