//! # Error Types
//!
//! Rejection labels shared by both ends of the bridge.
//!
//! The `Display` form of [`ValidationError`] is the exact string sent back to
//! the peer in the `message` field of an error response, so the wording is
//! part of the wire contract.

use crate::envelope::MessageType;
use thiserror::Error;

/// Which validation stage produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Operation name, payload shape or missing fields.
    Schema,
    /// Nonce, timestamp or request id reuse.
    Replay,
    /// Origin, source, device, session or signature.
    Trust,
}

/// Envelope rejected by the validator pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The `type` field does not name the expected operation.
    #[error("INVALID {operation} TYPE")]
    InvalidType { operation: MessageType },

    /// Required fields missing or payload has the wrong shape.
    #[error("INVALID {operation} SCHEMA")]
    InvalidSchema { operation: MessageType },

    /// Nonce already seen by this endpoint.
    #[error("INVALID NONCE")]
    InvalidNonce,

    /// Timestamp in the future or older than the tolerance.
    #[error("INVALID TIMESTAMP")]
    InvalidTimestamp,

    /// Channel origin not in the allow-list.
    #[error("INVALID ORIGIN")]
    InvalidOrigin,

    /// Message did not come from the expected peer.
    #[error("INVALID SOURCE")]
    InvalidSource,

    /// `deviceId` does not match the expected device.
    #[error("INVALID DEVICE ID")]
    InvalidDeviceId,

    /// Session token missing, unknown or not the current one.
    #[error("INVALID SESSION ID")]
    InvalidSessionId,

    /// Signature does not verify.
    #[error("INVALID SIGNATURE")]
    InvalidSignature,

    /// Request id malformed or already used.
    #[error("INVALID REQUEST ID")]
    InvalidRequestId,
}

impl ValidationError {
    /// Stage that produced the rejection.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::InvalidType { .. } | ValidationError::InvalidSchema { .. } => {
                ErrorCategory::Schema
            }
            ValidationError::InvalidNonce
            | ValidationError::InvalidTimestamp
            | ValidationError::InvalidRequestId => ErrorCategory::Replay,
            ValidationError::InvalidOrigin
            | ValidationError::InvalidSource
            | ValidationError::InvalidDeviceId
            | ValidationError::InvalidSessionId
            | ValidationError::InvalidSignature => ErrorCategory::Trust,
        }
    }

    /// Short metric label (no operation name, bounded cardinality).
    pub fn metric_label(&self) -> &'static str {
        match self {
            ValidationError::InvalidType { .. } => "type",
            ValidationError::InvalidSchema { .. } => "schema",
            ValidationError::InvalidNonce => "nonce",
            ValidationError::InvalidTimestamp => "timestamp",
            ValidationError::InvalidOrigin => "origin",
            ValidationError::InvalidSource => "source",
            ValidationError::InvalidDeviceId => "device_id",
            ValidationError::InvalidSessionId => "session_id",
            ValidationError::InvalidSignature => "signature",
            ValidationError::InvalidRequestId => "request_id",
        }
    }
}

/// Raw bytes could not be decoded into an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not JSON, or a field has the wrong type.
    #[error("malformed envelope (type: {message_type:?})")]
    Malformed {
        /// Value of the `type` field, empty if unreadable.
        message_type: String,
    },
}

/// Configuration rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
