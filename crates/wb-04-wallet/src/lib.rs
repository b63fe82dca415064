//! # Wallet Subsystem (WB-04)
//!
//! The isolated end of the bridge. Announces `READY`, accepts the
//! self-certifying handshake, then answers session-bound requests through
//! registered [`OperationHandler`]s.
//!
//! ## Architecture
//!
//! - **Ports** (`ports/`): [`OperationHandler`] (inbound) and
//!   [`KeyStorage`] (outbound).
//! - **Domain** (`domain/`): built-in handlers and their errors.
//! - **Adapters** (`adapters/`): in-memory key storage.
//! - **Responder** (`responder.rs`): validation and reply construction.
//! - **Service** (`service.rs`): the channel loop.
//!
//! ## Replies
//!
//! | Situation | Reply |
//! |-----------|-------|
//! | handshake accepted | signed `START_SESSION` success with the wallet key and `sessionId` |
//! | request handled | signed success bound to the session |
//! | validation failure | error with the stable label |
//! | `INVALID SESSION ID` | error with `terminate: "session"` |
//! | breaker tripped | `ANOMALY DETECTED` with `terminate: "full"` |
//! | no handler | `UNSUPPORTED <OP>` |
//! | unknown `type` | none (counted by the breaker) |

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod responder;
pub mod service;

pub use adapters::memory_storage::InMemoryKeyStorage;
pub use config::WalletConfig;
pub use domain::errors::WalletError;
pub use domain::handlers::{
    DeviceKeyHandler, ExistingDeviceKeyHandler, HandlerRegistry, SignDataHandler, StatusHandler,
    ThemeHandler, ThemeState,
};
pub use ports::inbound::OperationHandler;
pub use ports::outbound::{KeyClass, KeyRecord, KeyStorage};
pub use responder::WalletResponder;
pub use service::{spawn_wallet, spawn_wallet_in_memory};
