//! # Channel Messages
//!
//! What actually crosses the channel: the JSON-encoded envelope plus the
//! origin and source stamped by the channel on delivery.

use serde::{Deserialize, Serialize};
use shared_types::{DecodeError, WireEnvelope};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of a message sender (the peer context handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Wrap a known identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin and source identity of one side of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Scheme/host/port style origin string.
    pub origin: String,
    /// Context identity.
    pub source: SourceId,
}

impl Endpoint {
    /// Create an endpoint description.
    pub fn new(origin: impl Into<String>, source: SourceId) -> Self {
        Self {
            origin: origin.into(),
            source,
        }
    }
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Origin of the sending context, stamped by the channel.
    pub origin: String,
    /// Identity of the sending context, stamped by the channel.
    pub source: SourceId,
    /// JSON-encoded [`WireEnvelope`].
    pub data: Vec<u8>,
}

impl ChannelMessage {
    /// Decode the carried envelope.
    pub fn decode(&self) -> Result<WireEnvelope, DecodeError> {
        WireEnvelope::from_json(&self.data)
    }

    /// Read the `type` field without validating anything else.
    ///
    /// Returns an empty string if the data is not a JSON object with a
    /// string `type`.
    pub fn message_type(&self) -> String {
        serde_json::from_slice::<serde_json::Value>(&self.data)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
            .unwrap_or_default()
    }
}

/// Something arriving at an inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An envelope from the peer.
    Message(ChannelMessage),
    /// The host asked the wallet context to reload.
    Restart,
}
