//! Handler and storage errors.
//!
//! `Display` is the label sent back in the error envelope, so it never
//! carries internal detail.

use shared_crypto::CryptoError;
use shared_types::MessageType;
use thiserror::Error;

/// Why an operation handler failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// No handler registered for the operation.
    #[error("UNSUPPORTED {0}")]
    Unsupported(MessageType),

    /// The operation needs a device key that was never generated.
    #[error("DEVICE KEY NOT FOUND")]
    MissingDeviceKey,

    /// The payload passed validation but the handler cannot use it.
    #[error("INVALID {0} PAYLOAD")]
    InvalidPayload(MessageType),

    /// Key storage failed.
    #[error("STORAGE FAILURE")]
    Storage(String),

    /// Key material could not be used.
    #[error("KEY FAILURE")]
    Crypto(#[from] CryptoError),
}
