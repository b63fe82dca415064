//! Wallet configuration.

use serde::{Deserialize, Serialize};
use shared_types::{ConfigError, ValidationPolicy};
use wb_02_validator::AnomalyConfig;

/// Wallet responder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Origins the host may post from.
    pub allowed_origins: Vec<String>,
    /// Source identity of the host context.
    pub host_source: String,
    /// Breaker ceilings.
    pub anomaly: AnomalyConfig,
    /// Freshness tolerance.
    pub policy: ValidationPolicy,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["https://host.localhost".to_string()],
            host_source: "host".to_string(),
            anomaly: AnomalyConfig::default(),
            policy: ValidationPolicy::default(),
        }
    }
}

impl WalletConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_origins.is_empty() {
            return Err(ConfigError::Invalid("allowed_origins cannot be empty".into()));
        }
        if self.allowed_origins.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "allowed_origins cannot contain an empty origin".into(),
            ));
        }
        if self.host_source.is_empty() {
            return Err(ConfigError::Invalid("host_source cannot be empty".into()));
        }
        self.anomaly.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}
