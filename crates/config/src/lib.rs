//! Configuration loading, validation, and management for Tierwise.
//!
//! Loads configuration from `~/.tierwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tierwise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Estimation and test-length settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Session/result persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where calibrated items come from
    #[serde(default)]
    pub item_bank: ItemBankConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Engine constants. The scale bounds and level cut points are not
/// empirically derived, so they are exposed here rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Items administered per diagnostic
    #[serde(default = "default_total_items")]
    pub total_items: usize,

    #[serde(default = "default_theta_min")]
    pub theta_min: f64,

    #[serde(default = "default_theta_max")]
    pub theta_max: f64,

    /// Theta strictly below this is Foundation
    #[serde(default = "default_foundation_below")]
    pub foundation_below: f64,

    /// Theta at or above this is Advanced
    #[serde(default = "default_advanced_from")]
    pub advanced_from: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_convergence")]
    pub convergence: f64,
}

fn default_total_items() -> usize {
    25
}
fn default_theta_min() -> f64 {
    -3.0
}
fn default_theta_max() -> f64 {
    3.0
}
fn default_foundation_below() -> f64 {
    -0.5
}
fn default_advanced_from() -> f64 {
    0.5
}
fn default_max_iterations() -> usize {
    20
}
fn default_convergence() -> f64 {
    0.001
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_items: default_total_items(),
            theta_min: default_theta_min(),
            theta_max: default_theta_max(),
            foundation_below: default_foundation_below(),
            advanced_from: default_advanced_from(),
            max_iterations: default_max_iterations(),
            convergence: default_convergence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_database_url() -> String {
    format!("sqlite://{}", AppConfig::config_dir().join("tierwise.db").display())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBankConfig {
    /// JSON file holding the calibrated items
    #[serde(default = "default_item_bank_path")]
    pub path: PathBuf,

    /// Accepted domain tags. Empty accepts any tag.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

fn default_item_bank_path() -> PathBuf {
    AppConfig::config_dir().join("item_bank.json")
}

impl Default for ItemBankConfig {
    fn default() -> Self {
        Self {
            path: default_item_bank_path(),
            allowed_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Requests per minute per student before 429s; 0 disables limiting
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    8740
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> usize {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tierwise/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TIERWISE_ITEM_BANK`: item bank path
    /// - `TIERWISE_DATABASE_URL`: database URL
    /// - `TIERWISE_STORAGE`: storage backend
    /// - `TIERWISE_TOTAL_ITEMS`: items per diagnostic
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = lookup("TIERWISE_ITEM_BANK") {
            self.item_bank.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("TIERWISE_DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Some(backend) = lookup("TIERWISE_STORAGE") {
            self.storage.backend = backend;
        }
        if let Some(total) = lookup("TIERWISE_TOTAL_ITEMS") {
            self.engine.total_items = total.parse().map_err(|_| {
                ConfigError::ValidationError(format!("TIERWISE_TOTAL_ITEMS is not a count: {total}"))
            })?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tierwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.total_items == 0 {
            return Err(ConfigError::ValidationError("engine.total_items must be > 0".into()));
        }
        if !(engine.theta_min.is_finite() && engine.theta_max.is_finite()) || engine.theta_min >= engine.theta_max {
            return Err(ConfigError::ValidationError(
                "engine.theta_min must be finite and below engine.theta_max".into(),
            ));
        }
        if !(engine.foundation_below.is_finite() && engine.advanced_from.is_finite()) {
            return Err(ConfigError::ValidationError(
                "engine.foundation_below and engine.advanced_from must be finite".into(),
            ));
        }
        if engine.foundation_below > engine.advanced_from {
            return Err(ConfigError::ValidationError(
                "engine.foundation_below must not exceed engine.advanced_from".into(),
            ));
        }
        if engine.max_iterations == 0 {
            return Err(ConfigError::ValidationError("engine.max_iterations must be > 0".into()));
        }
        if !(engine.convergence > 0.0) {
            return Err(ConfigError::ValidationError("engine.convergence must be > 0".into()));
        }

        match self.storage.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "storage.backend must be \"sqlite\" or \"memory\", got \"{other}\""
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
