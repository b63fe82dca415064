//! # Shared Bus - Message Channel Between Host and Wallet
//!
//! The wallet context is reachable only through an asynchronous message
//! channel. Every delivered message is stamped by the channel itself with the
//! sender's origin and source identity; those stamps, not anything inside the
//! envelope, are what the validator checks for `INVALID ORIGIN` and
//! `INVALID SOURCE`.
//!
//! ```text
//! ┌──────────────┐   post(envelope)    ┌──────────────┐
//! │     Host     │ ──────────────────► │    Wallet    │
//! │  (connector) │ ◄────────────────── │  (responder) │
//! │              │   post(envelope)    │              │
//! │              │ ─── restart() ────► │              │
//! └──────────────┘                     └──────────────┘
//! ```
//!
//! ## Ports
//!
//! - [`MessagePort`]: send an envelope to the other side.
//! - [`ContextControl`]: force the wallet context to reload (host only).
//! - [`Inbox`]: receive [`ChannelEvent`]s addressed to this side.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod message;
pub mod publisher;
pub mod subscriber;

pub use message::{ChannelEvent, ChannelMessage, Endpoint, SourceId};
pub use publisher::{ChannelError, ChannelPort, ContextControl, MessagePort, RestartHandle};
pub use subscriber::{in_memory_channel, in_memory_channel_with_capacity, HostSide, Inbox, WalletSide};

/// Maximum messages buffered per inbox before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
