//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key, tampered ciphertext or mismatched context)
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Invalid nonce length
    #[error("Invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length in bytes
        expected: usize,
        /// Actual nonce length in bytes
        actual: usize,
    },

    /// Signing failed
    #[error("Signing failed")]
    SigningFailed,

    /// Invalid public key encoding
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key encoding
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Key export failed
    #[error("Key export failed: {0}")]
    ExportFailed(String),
}
