//! # Wallet Bridge Test Suite
//!
//! Cross-crate scenarios running the real connector against the real
//! wallet responder over the in-memory channel.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs       # Bridge fixture, recording ports
//!     ├── handshake.rs     # READY → START_SESSION → Ready, retries
//!     ├── operations.rs    # Session-bound operations, backup queue
//!     ├── replay.rs        # Replay and forgery rejection
//!     └── termination.rs   # Session/full termination, anomaly breaker
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p wb-tests
//! cargo test -p wb-tests integration::replay
//! ```

pub mod integration;
