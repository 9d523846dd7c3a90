//! Configuration management for wa-relay

mod gateway;
pub mod serde_utils;

pub use gateway::{GatewayConfig, PairingConfig, DEFAULT_IPC_PORT};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wa-relay")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the gateway config from `path`, or the default location.
///
/// An explicit path must exist and parse. The default location is optional:
/// if it is missing or broken, defaults are used and a warning is logged.
pub fn load_gateway_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = match path {
        Some(path) => load_config(path)?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                    GatewayConfig::default()
                })
            } else {
                tracing::info!("Using default configuration");
                GatewayConfig::default()
            }
        }
    };
    config.validate()?;
    Ok(config)
}

/// Write a default config file on first run.
///
/// Returns the path written, or `None` if a config already exists.
pub fn init_default_config() -> Result<Option<PathBuf>, ConfigError> {
    let path = default_config_path();
    if path.exists() {
        return Ok(None);
    }
    save_config(&path, &GatewayConfig::default())?;
    Ok(Some(path))
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
