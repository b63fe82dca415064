//! # Inboxes and Channel Construction
//!
//! Receiving side of the channel and the in-memory pair used to connect a
//! host and a wallet running in the same process.

use crate::message::{ChannelEvent, Endpoint};
use crate::publisher::{ChannelError, ChannelPort, RestartHandle};
use crate::DEFAULT_CHANNEL_CAPACITY;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiving end of one side of the channel.
pub struct Inbox {
    receiver: mpsc::Receiver<ChannelEvent>,
}

impl Inbox {
    pub(crate) fn new(receiver: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event
    /// - `None` - Every sender was dropped
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.receiver.recv().await
    }

    /// Try to receive the next event without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available
    /// - `Ok(None)` - Nothing available yet
    /// - `Err(ChannelError::Closed)` - Every sender was dropped
    pub fn try_recv(&mut self) -> Result<Option<ChannelEvent>, ChannelError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// Stop accepting new events; buffered ones can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Host end of an in-memory channel.
pub struct HostSide {
    /// Posts to the wallet, stamped with the host endpoint.
    pub port: ChannelPort,
    /// Reloads the wallet context.
    pub control: RestartHandle,
    /// Messages from the wallet.
    pub inbox: Inbox,
    /// The wallet endpoint messages are expected from.
    pub wallet: Endpoint,
}

/// Wallet end of an in-memory channel.
pub struct WalletSide {
    /// Posts to the host, stamped with the wallet endpoint.
    pub port: ChannelPort,
    /// Messages and restart signals from the host.
    pub inbox: Inbox,
    /// The host endpoint messages are expected from.
    pub host: Endpoint,
}

/// Connect a host endpoint and a wallet endpoint.
#[must_use]
pub fn in_memory_channel(host: Endpoint, wallet: Endpoint) -> (HostSide, WalletSide) {
    in_memory_channel_with_capacity(host, wallet, DEFAULT_CHANNEL_CAPACITY)
}

/// Connect two endpoints with a custom inbox capacity.
#[must_use]
pub fn in_memory_channel_with_capacity(
    host: Endpoint,
    wallet: Endpoint,
    capacity: usize,
) -> (HostSide, WalletSide) {
    let (to_wallet, wallet_rx) = mpsc::channel(capacity);
    let (to_host, host_rx) = mpsc::channel(capacity);

    debug!(
        host_origin = %host.origin,
        wallet_origin = %wallet.origin,
        capacity,
        "In-memory channel opened"
    );

    let host_side = HostSide {
        port: ChannelPort::new(to_wallet.clone(), host.clone()),
        control: RestartHandle::new(to_wallet),
        inbox: Inbox::new(host_rx),
        wallet: wallet.clone(),
    };
    let wallet_side = WalletSide {
        port: ChannelPort::new(to_host, wallet),
        inbox: Inbox::new(wallet_rx),
        host,
    };
    (host_side, wallet_side)
}
