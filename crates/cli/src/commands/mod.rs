//! Subcommand implementations plus the bootstrap they share.

pub mod bank;
pub mod config_cmd;
pub mod serve;
pub mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tierwise_bank::{ItemPool, JsonItemBank};
use tierwise_config::{AppConfig, StorageConfig};
use tierwise_core::{BankError, DiagnosticRepository, StoreError};
use tierwise_store::{InMemoryRepository, SqliteRepository};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load config from `path` (or the default location), then apply env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// Where the config file lives for this invocation.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the item pool named by config, or by `bank_override`.
pub fn load_pool(config: &AppConfig, bank_override: Option<&Path>) -> Result<ItemPool, BankError> {
    let path = bank_override.unwrap_or(&config.item_bank.path);
    let bank = JsonItemBank::new(path);
    ItemPool::load_restricted(&bank, &config.item_bank.allowed_domains)
}

/// Open the configured storage backend.
pub async fn open_repository(storage: &StorageConfig) -> Result<Arc<dyn DiagnosticRepository>, StoreError> {
    match storage.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryRepository::new())),
        _ => {
            if let Some(parent) = sqlite_file(&storage.database_url).and_then(Path::parent) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            Ok(Arc::new(SqliteRepository::new(&storage.database_url).await?))
        }
    }
}

/// The file behind a `sqlite://` URL, if it names one.
fn sqlite_file(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty() && !path.contains(":memory:")).then(|| Path::new(path))
}
