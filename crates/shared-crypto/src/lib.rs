//! # Shared Crypto - Identity and Sealing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `identity` | ECDSA P-384 over SHA-512 | Ephemeral session keys, device identity |
//! | `symmetric` | XChaCha20-Poly1305 | Self-certifying session tokens |
//!
//! ## Security Properties
//!
//! - **P-384**: RFC 6979 deterministic nonces, SPKI/PKCS#8 DER encodings
//! - **SHA-512 prehash**: truncated to the 384-bit field as ECDSA requires
//! - **XChaCha20**: 192-bit random nonce, associated data authenticated
//! - Private material and exported copies are zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod identity;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use identity::{KeyPair, PublicKey, SIGNATURE_LEN};
pub use symmetric::{open, seal, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
