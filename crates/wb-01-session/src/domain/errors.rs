use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors from session creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Sealing the session token failed.
    #[error("session token issuance failed: {0}")]
    Issuance(#[from] CryptoError),
}
