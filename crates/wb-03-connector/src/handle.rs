//! Caller-facing handle to a running connector.

use shared_crypto::PublicKey;
use shared_types::{MessageType, Payload, ValidationError};
use tokio::sync::{mpsc, oneshot, watch};
use wb_02_validator::resolve_spki;

use crate::domain::errors::ConnectorError;
use crate::domain::status::ConnectorStatus;
use crate::service::Command;

/// Cloneable handle to a connector task.
///
/// Every operation suspends until its response is validated or the
/// connector fails. Dropping every handle destroys the connector.
#[derive(Clone)]
pub struct ConnectorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectorStatus>,
}

impl ConnectorHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        status: watch::Receiver<ConnectorStatus>,
    ) -> Self {
        Self { commands, status }
    }

    /// Submit `operation` and wait for the wallet's answer.
    ///
    /// While the connector is loading the operation is queued and sent once
    /// the session is established.
    pub async fn request(
        &self,
        operation: MessageType,
        payload: Payload,
    ) -> Result<Payload, ConnectorError> {
        let (reply, response) = oneshot::channel();
        let command = Command::Submit {
            operation,
            payload,
            reply,
        };
        if self.commands.send(command).await.is_err() {
            return Err(self.terminal_error());
        }
        match response.await {
            Ok(result) => result,
            Err(_) => Err(self.terminal_error()),
        }
    }

    // =========================================================================
    // TYPED OPERATIONS
    // =========================================================================

    /// Wallet status document.
    pub async fn get_status(&self) -> Result<serde_json::Value, ConnectorError> {
        match self.request(MessageType::GetStatus, Payload::Empty).await? {
            Payload::Json(value) => Ok(value),
            _ => Err(schema(MessageType::GetStatus)),
        }
    }

    /// Wallet information document.
    pub async fn get_wallet_info(&self) -> Result<serde_json::Value, ConnectorError> {
        match self.request(MessageType::GetWalletInfo, Payload::Empty).await? {
            Payload::Json(value) => Ok(value),
            _ => Err(schema(MessageType::GetWalletInfo)),
        }
    }

    /// Switch the wallet theme. Returns whether the wallet applied it.
    pub async fn set_theme(&self, theme: &str) -> Result<bool, ConnectorError> {
        match self
            .request(MessageType::SetTheme, Payload::Text(theme.to_string()))
            .await?
        {
            Payload::Bool(applied) => Ok(applied),
            _ => Err(schema(MessageType::SetTheme)),
        }
    }

    /// Sign arbitrary data with the device key.
    pub async fn sign_data(&self, data: Vec<u8>) -> Result<Vec<u8>, ConnectorError> {
        self.bytes_operation(MessageType::SignData, Payload::Bytes(data))
            .await
    }

    /// Sign an encoded transaction.
    pub async fn sign_transaction(&self, transaction: Vec<u8>) -> Result<Vec<u8>, ConnectorError> {
        self.bytes_operation(MessageType::SignTransaction, Payload::Bytes(transaction))
            .await
    }

    /// Create (or replace) the persistent device key.
    pub async fn generate_device_key(&self) -> Result<PublicKey, ConnectorError> {
        self.key_operation(MessageType::GenerateDeviceKey).await
    }

    /// Public half of the persisted device key.
    pub async fn get_existed_device_public_key(&self) -> Result<PublicKey, ConnectorError> {
        self.key_operation(MessageType::GetExistedDevicePublicKey)
            .await
    }

    async fn bytes_operation(
        &self,
        operation: MessageType,
        payload: Payload,
    ) -> Result<Vec<u8>, ConnectorError> {
        match self.request(operation, payload).await? {
            Payload::Bytes(bytes) => Ok(bytes),
            _ => Err(schema(operation)),
        }
    }

    async fn key_operation(&self, operation: MessageType) -> Result<PublicKey, ConnectorError> {
        let payload = self.request(operation, Payload::Empty).await?;
        resolve_spki(&payload).ok_or_else(|| schema(operation))
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Current status.
    pub fn status(&self) -> ConnectorStatus {
        *self.status.borrow()
    }

    /// Watch status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectorStatus> {
        self.status.clone()
    }

    /// Wait until a session is established.
    ///
    /// Fails once the connector reaches a terminal status.
    pub async fn wait_ready(&self) -> Result<(), ConnectorError> {
        let mut status = self.status.clone();
        loop {
            let current = *status.borrow_and_update();
            match current {
                ConnectorStatus::Ready => return Ok(()),
                ConnectorStatus::Failed => return Err(ConnectorError::HandshakeFailed),
                ConnectorStatus::Destroyed => return Err(ConnectorError::Destroyed),
                ConnectorStatus::Loading | ConnectorStatus::Handshaking => {}
            }
            if status.changed().await.is_err() {
                return Err(self.terminal_error());
            }
        }
    }

    /// Stop the connector, rejecting every queued and outstanding operation.
    pub async fn destroy(&self) {
        let (done, stopped) = oneshot::channel();
        if self.commands.send(Command::Destroy { done }).await.is_ok() {
            let _ = stopped.await;
        }
    }

    fn terminal_error(&self) -> ConnectorError {
        match self.status() {
            ConnectorStatus::Failed => ConnectorError::HandshakeFailed,
            _ => ConnectorError::Destroyed,
        }
    }
}

fn schema(operation: MessageType) -> ConnectorError {
    ConnectorError::Validation(ValidationError::InvalidSchema { operation })
}
