//! Connector configuration.

use serde::{Deserialize, Serialize};
use shared_types::{ConfigError, ValidationPolicy};
use wb_02_validator::AnomalyConfig;

/// Host connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Origin the wallet context posts from.
    pub wallet_origin: String,
    /// Source identity of the wallet context.
    pub wallet_source: String,
    /// Failed handshakes tolerated before the connector gives up.
    pub max_handshake_retries: u32,
    /// Capacity of the command queue between handles and the actor.
    pub command_buffer: usize,
    /// Breaker ceilings.
    pub anomaly: AnomalyConfig,
    /// Freshness tolerance.
    pub policy: ValidationPolicy,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            wallet_origin: "https://wallet.localhost".to_string(),
            wallet_source: "wallet".to_string(),
            max_handshake_retries: 5,
            command_buffer: 256,
            anomaly: AnomalyConfig::default(),
            policy: ValidationPolicy::default(),
        }
    }
}

impl ConnectorConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet_origin.is_empty() {
            return Err(ConfigError::Invalid("wallet_origin cannot be empty".into()));
        }
        if self.wallet_source.is_empty() {
            return Err(ConfigError::Invalid("wallet_source cannot be empty".into()));
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid("command_buffer cannot be 0".into()));
        }
        self.anomaly.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}
