//! # Bridge Runtime Library
//!
//! Exposes the runtime wiring for testing. The main entry point is the
//! `main.rs` binary.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file named by `BRIDGE_CONFIG`, then env)
//! 2. Initialise telemetry
//! 3. Spawn the wallet context and announce `READY`
//! 4. Spawn the host connector and wait for the handshake
//! 5. Run the self-check

pub mod config;
pub mod runtime;

pub use config::{ConfigLoadError, RuntimeConfig};
pub use runtime::BridgeRuntime;
