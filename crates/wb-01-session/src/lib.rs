//! # Session Subsystem (WB-01)
//!
//! Holds the trust anchor for every session-bound message: the local
//! ephemeral key pair, the remote ephemeral public key and the session token
//! that binds messages to one specific handshake.
//!
//! ## Architecture
//!
//! - [`SessionIssuer`]: wallet-side token mint. A token is the current
//!   timestamp sealed under a key that never leaves the issuer, so it can be
//!   re-verified without a lookup table. Only the most recently issued token
//!   verifies.
//! - [`Session`]: one completed handshake. The wallet side creates it
//!   (minting a token), the host side establishes it from the handshake
//!   response.
//! - [`SessionSlot`]: the single live session of an endpoint. Readers take an
//!   `Arc` snapshot, so a validation already running against a replaced
//!   session finishes against it, and key material is released only when the
//!   last snapshot is dropped.
//!
//! ## Security Notes
//!
//! - Issued timestamps are strictly increasing; a replaced session's token
//!   never verifies again.
//! - Dropping a wallet-side session whose token is still the latest retires
//!   the token.

pub mod domain;

pub use domain::errors::SessionError;
pub use domain::issuer::{SessionIssuer, SESSION_TOKEN_CONTEXT};
pub use domain::session::{Session, SessionRole};
pub use domain::slot::SessionSlot;
