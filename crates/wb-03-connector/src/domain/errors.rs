//! Errors surfaced to connector callers.
//!
//! `Display` is always a stable label; nothing from inside the trust
//! boundary leaks through it.

use shared_types::ValidationError;
use thiserror::Error;

/// Why an operation did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// The wallet answered with an error envelope.
    #[error("{0}")]
    Rejected(String),

    /// The wallet's answer failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The handshake could not be completed within the retry ceiling.
    #[error("HANDSHAKE FAILED")]
    HandshakeFailed,

    /// The session was dropped before this operation was answered.
    #[error("SESSION TERMINATED")]
    SessionTerminated,

    /// The wallet terminated the connector.
    #[error("CONNECTOR TERMINATED")]
    Terminated,

    /// The connector was destroyed.
    #[error("CONNECTOR DESTROYED")]
    Destroyed,

    /// The anomaly breaker tripped.
    #[error("ANOMALY DETECTED")]
    Anomaly,

    /// The message channel is unavailable.
    #[error("CHANNEL UNAVAILABLE")]
    Channel,

    /// The request could not be signed.
    #[error("SIGNING FAILED")]
    Signing,
}

impl ConnectorError {
    /// Errors after which the connector accepts no further operations.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectorError::HandshakeFailed
                | ConnectorError::Terminated
                | ConnectorError::Destroyed
                | ConnectorError::Anomaly
        )
    }
}
