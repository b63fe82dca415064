//! # Connector Subsystem (WB-03)
//!
//! Host end of the bridge. Drives the handshake with the wallet context,
//! queues operations until a session exists and resolves each caller when
//! the matching response arrives.
//!
//! ## State Machine
//!
//! ```text
//!            READY                    START_SESSION success
//! [LOADING] ──────► [HANDSHAKING] ─────────────────────────► [READY]
//!     ▲                  │                                      │
//!     │  failure, retry  │                                      │ terminate: session
//!     └──────────────────┘◄─────────────────────────────────────┘
//!                        │
//!                        │ retries exhausted        terminate: full / anomaly / destroy()
//!                        ▼                                      │
//!                    [FAILED]                             [DESTROYED]
//! ```
//!
//! Operations submitted outside `READY` go to a backup queue and are rebuilt
//! (fresh nonce, timestamp and signature) when the session comes up.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (host, wallet) = in_memory_channel(host_endpoint, wallet_endpoint);
//! let connector = Connector::spawn(config, ConnectorPorts::in_memory(host, device, clock))?;
//! connector.wait_ready().await?;
//! let accepted = connector.set_theme("dark").await?;
//! ```

pub mod config;
pub mod domain;
pub mod handle;
pub mod service;

pub use config::ConnectorConfig;
pub use domain::errors::ConnectorError;
pub use domain::retry::{HandshakeRetry, RetryDecision};
pub use domain::status::ConnectorStatus;
pub use handle::ConnectorHandle;
pub use service::{Connector, ConnectorPorts};
