//! Driving port: per-operation handlers.

use async_trait::async_trait;
use shared_types::Payload;

use crate::domain::errors::WalletError;

/// Serves one operation once its request passed validation.
///
/// Handlers only ever see verified payloads; the responder signs whatever
/// they return.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Produce the success payload for a verified request.
    async fn handle(&self, payload: Payload) -> Result<Payload, WalletError>;
}
