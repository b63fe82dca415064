//! # Runtime Configuration
//!
//! Unified configuration for both endpoints.
//!
//! Loaded from the TOML file named by `BRIDGE_CONFIG` when set, otherwise
//! from defaults. Selected fields can then be overridden from the
//! environment:
//!
//! - `BRIDGE_DEVICE_ID`
//! - `BRIDGE_HOST_ORIGIN`
//! - `BRIDGE_WALLET_ORIGIN`

use serde::{Deserialize, Serialize};
use shared_types::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use wb_03_connector::ConnectorConfig;
use wb_04_wallet::WalletConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "BRIDGE_CONFIG";

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Device identifier placed in every envelope by both endpoints.
    pub device_id: String,
    /// Origin stamped on host messages.
    pub host_origin: String,
    /// Host endpoint.
    pub connector: ConnectorConfig,
    /// Wallet endpoint.
    pub wallet: WalletConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let wallet = WalletConfig::default();
        Self {
            device_id: "bridge-device".to_string(),
            host_origin: wallet
                .allowed_origins
                .first()
                .cloned()
                .unwrap_or_else(|| "https://host.localhost".to_string()),
            connector: ConnectorConfig::default(),
            wallet,
        }
    }
}

impl RuntimeConfig {
    /// Load from `BRIDGE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Self::from_toml(&text)
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `lookup` (usually the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(device_id) = lookup("BRIDGE_DEVICE_ID") {
            self.device_id = device_id;
        }
        if let Some(origin) = lookup("BRIDGE_HOST_ORIGIN") {
            if !self.wallet.allowed_origins.contains(&origin) {
                self.wallet.allowed_origins.push(origin.clone());
            }
            self.host_origin = origin;
        }
        if let Some(origin) = lookup("BRIDGE_WALLET_ORIGIN") {
            self.connector.wallet_origin = origin;
        }
    }

    /// Validate both endpoints and their agreement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::Invalid("device_id cannot be empty".into()));
        }
        self.connector.validate()?;
        self.wallet.validate()?;
        if !self.wallet.allowed_origins.contains(&self.host_origin) {
            return Err(ConfigError::Invalid(format!(
                "host_origin {} is not allowed by the wallet",
                self.host_origin
            )));
        }
        Ok(())
    }
}
