//! `tierwise config`: Configuration management commands.

use std::path::Path;

use tierwise_config::AppConfig;

use super::CommandResult;

pub async fn validate(config_path: Option<&Path>) -> CommandResult {
    println!("🔍 Validating configuration...");

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.item_bank.path.exists() {
                warnings.push(format!("Item bank not found at {}", config.item_bank.path.display()));
            }
            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0 (all interfaces)".to_string());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Item bank: {}", config.item_bank.path.display());
            println!("   Storage:   {} ({})", config.storage.backend, config.storage.database_url);
            println!("   Budget:    {} items", config.engine.total_items);
            println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> CommandResult {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> CommandResult {
    println!("{}", super::config_file(config_path).display());
    Ok(())
}

pub async fn default() -> CommandResult {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn validate_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ntotal_items = 10\n\n[storage]\nbackend = \"memory\"").unwrap();
        validate(Some(file.path())).await.unwrap();
    }

    #[tokio::test]
    async fn validate_rejects_bad_backend() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nbackend = \"postgres\"").unwrap();
        assert!(validate(Some(file.path())).await.is_err());
    }

    #[test]
    fn default_toml_round_trips() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.engine.total_items, 25);
    }
}
