//! # Configuration
//!
//! Reads the TOML file next to the executable and deserializes it into
//! [`GatewayConfig`]. Every key is optional; a missing file means defaults.

use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use thiserror::Error;

use crate::service::RefreshPolicy;

/// Top-level runtime config.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mirror of the `[driver]` table.
#[derive(Debug, Default, Deserialize)]
pub struct DriverConfig {
    /// Directory holding the driver binary; the executable's directory when
    /// absent.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Keep an existing service registration instead of recreating it on
    /// every start.
    #[serde(default)]
    pub reuse_existing: bool,
}

impl DriverConfig {
    pub fn refresh_policy(&self) -> RefreshPolicy {
        if self.reuse_existing {
            RefreshPolicy::ReuseExisting
        } else {
            RefreshPolicy::AlwaysRecreate
        }
    }
}

/// Mirror of the `[logging]` table.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "INFO".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

/// All the ways config loading can go wrong.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Load and parse the configuration from `path`.
pub fn load(path: &Path) -> Result<GatewayConfig, ConfigError> {
    log::debug!("Reading config from {:?}", path);
    let txt = fs::read_to_string(path)?;
    let cfg: GatewayConfig = toml::from_str(&txt)?;
    log::info!("Loaded config from {:?}", path);
    Ok(cfg)
}
