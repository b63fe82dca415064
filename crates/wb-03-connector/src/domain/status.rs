//! Observable connector status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the connector is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    /// Waiting for the wallet's `READY`.
    #[default]
    Loading,
    /// `START_SESSION` sent, waiting for the answer.
    Handshaking,
    /// Session established; operations are sent immediately.
    Ready,
    /// Handshake retries exhausted (terminal).
    Failed,
    /// Destroyed or terminated (terminal).
    Destroyed,
}

impl ConnectorStatus {
    /// Whether the connector has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectorStatus::Failed | ConnectorStatus::Destroyed)
    }

    /// Whether operations are queued instead of sent.
    pub fn is_loading(&self) -> bool {
        matches!(self, ConnectorStatus::Loading | ConnectorStatus::Handshaking)
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorStatus::Loading => "loading",
            ConnectorStatus::Handshaking => "handshaking",
            ConnectorStatus::Ready => "ready",
            ConnectorStatus::Failed => "failed",
            ConnectorStatus::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
