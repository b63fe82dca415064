//! # Channel Ports
//!
//! Sending side of the channel: posting envelopes and restarting the wallet
//! context.

use crate::message::{ChannelEvent, ChannelMessage, Endpoint};
use shared_types::WireEnvelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors from channel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The receiving side was dropped.
    #[error("channel closed")]
    Closed,
    /// The receiving inbox is full.
    #[error("channel full")]
    Full,
    /// The envelope could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Port for sending envelopes to the peer.
///
/// Posting is fire-and-forget: delivery is asynchronous and there is no
/// acknowledgement beyond the eventual response envelope.
pub trait MessagePort: Send + Sync {
    /// Post an envelope to the peer.
    fn post(&self, envelope: &WireEnvelope) -> Result<(), ChannelError>;
}

/// Capability to reload the wallet context.
///
/// The wallet re-announces `READY` after a reload.
pub trait ContextControl: Send + Sync {
    /// Force the wallet context to reload.
    fn restart(&self) -> Result<(), ChannelError>;
}

/// In-memory [`MessagePort`].
///
/// Every posted message is stamped with this port's [`Endpoint`], so the
/// receiver sees the sender's origin and source regardless of the envelope
/// content.
#[derive(Clone)]
pub struct ChannelPort {
    sender: mpsc::Sender<ChannelEvent>,
    stamp: Endpoint,
    posted: Arc<AtomicU64>,
}

impl ChannelPort {
    pub(crate) fn new(sender: mpsc::Sender<ChannelEvent>, stamp: Endpoint) -> Self {
        Self {
            sender,
            stamp,
            posted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A port to the same inbox that stamps a different endpoint.
    ///
    /// Models a foreign context that managed to obtain a handle to the
    /// receiving side.
    #[must_use]
    pub fn impersonate(&self, stamp: Endpoint) -> Self {
        Self {
            sender: self.sender.clone(),
            stamp,
            posted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Post pre-encoded bytes (used to deliver malformed data).
    pub fn post_raw(&self, data: Vec<u8>) -> Result<(), ChannelError> {
        let message = ChannelMessage {
            origin: self.stamp.origin.clone(),
            source: self.stamp.source.clone(),
            data,
        };
        self.sender
            .try_send(ChannelEvent::Message(message))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
            })?;
        self.posted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Endpoint stamped on outgoing messages.
    #[must_use]
    pub fn stamp(&self) -> &Endpoint {
        &self.stamp
    }

    /// Total messages posted through this port.
    #[must_use]
    pub fn messages_posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }
}

impl MessagePort for ChannelPort {
    fn post(&self, envelope: &WireEnvelope) -> Result<(), ChannelError> {
        let data = envelope
            .to_json()
            .map_err(|e| ChannelError::Encode(e.to_string()))?;

        match self.post_raw(data) {
            Ok(()) => {
                debug!(
                    message_type = %envelope.message_type,
                    origin = %self.stamp.origin,
                    "Envelope posted"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    message_type = %envelope.message_type,
                    error = %e,
                    "Envelope dropped"
                );
                Err(e)
            }
        }
    }
}

/// In-memory [`ContextControl`] that signals the wallet inbox.
#[derive(Clone)]
pub struct RestartHandle {
    sender: mpsc::Sender<ChannelEvent>,
}

impl RestartHandle {
    pub(crate) fn new(sender: mpsc::Sender<ChannelEvent>) -> Self {
        Self { sender }
    }
}

impl ContextControl for RestartHandle {
    fn restart(&self) -> Result<(), ChannelError> {
        debug!("Wallet context restart requested");
        self.sender
            .try_send(ChannelEvent::Restart)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
            })
    }
}
