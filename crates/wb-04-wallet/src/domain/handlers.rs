//! Built-in operation handlers and the registry the responder dispatches to.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::KeyPair;
use shared_types::{MessageType, Payload};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::WalletError;
use crate::ports::inbound::OperationHandler;
use crate::ports::outbound::{KeyClass, KeyRecord, KeyStorage};

/// Themes the wallet UI knows how to render.
pub const SUPPORTED_THEMES: [&str; 3] = ["light", "dark", "system"];

// =============================================================================
// REGISTRY
// =============================================================================

/// Operation name to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageType, Arc<dyn OperationHandler>>,
}

impl HandlerRegistry {
    /// Registry with no handlers (every operation is unsupported).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers over `storage`.
    pub fn with_defaults(storage: Arc<dyn KeyStorage>) -> Self {
        let theme = Arc::new(ThemeState::default());
        let mut registry = Self::new();
        registry.register(
            MessageType::GetStatus,
            Arc::new(StatusHandler::new(storage.clone(), theme.clone())),
        );
        registry.register(MessageType::SetTheme, Arc::new(ThemeHandler::new(theme)));
        registry.register(
            MessageType::GenerateDeviceKey,
            Arc::new(DeviceKeyHandler::new(storage.clone())),
        );
        registry.register(
            MessageType::GetExistedDevicePublicKey,
            Arc::new(ExistingDeviceKeyHandler::new(storage.clone())),
        );
        registry.register(MessageType::SignData, Arc::new(SignDataHandler::new(storage)));
        registry
    }

    /// Install `handler` for `operation`, returning the one it replaced.
    pub fn register(
        &mut self,
        operation: MessageType,
        handler: Arc<dyn OperationHandler>,
    ) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.insert(operation, handler)
    }

    /// Handler for `operation`.
    pub fn get(&self, operation: MessageType) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(&operation).cloned()
    }

    /// Whether `operation` has a handler.
    pub fn supports(&self, operation: MessageType) -> bool {
        self.handlers.contains_key(&operation)
    }
}

// =============================================================================
// THEME
// =============================================================================

/// Currently applied theme.
#[derive(Debug)]
pub struct ThemeState {
    current: RwLock<String>,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::new("light")
    }
}

impl ThemeState {
    /// Start with `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
        }
    }

    /// Applied theme.
    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    fn set(&self, theme: &str) {
        *self.current.write() = theme.to_string();
    }
}

/// `SET_THEME`: applies a supported theme, answers whether it was applied.
pub struct ThemeHandler {
    theme: Arc<ThemeState>,
}

impl ThemeHandler {
    pub fn new(theme: Arc<ThemeState>) -> Self {
        Self { theme }
    }
}

#[async_trait]
impl OperationHandler for ThemeHandler {
    async fn handle(&self, payload: Payload) -> Result<Payload, WalletError> {
        let requested = payload
            .as_text()
            .ok_or(WalletError::InvalidPayload(MessageType::SetTheme))?;
        if !SUPPORTED_THEMES.contains(&requested) {
            debug!(theme = %requested, "Unsupported theme ignored");
            return Ok(Payload::Bool(false));
        }
        self.theme.set(requested);
        info!(theme = %requested, "Theme applied");
        Ok(Payload::Bool(true))
    }
}

/// `GET_STATUS`: device key presence and theme.
pub struct StatusHandler {
    storage: Arc<dyn KeyStorage>,
    theme: Arc<ThemeState>,
}

impl StatusHandler {
    pub fn new(storage: Arc<dyn KeyStorage>, theme: Arc<ThemeState>) -> Self {
        Self { storage, theme }
    }
}

#[async_trait]
impl OperationHandler for StatusHandler {
    async fn handle(&self, _payload: Payload) -> Result<Payload, WalletError> {
        let has_device_key = self.storage.get_public_key().await?.is_some();
        Ok(Payload::Json(serde_json::json!({
            "hasDeviceKey": has_device_key,
            "theme": self.theme.current(),
        })))
    }
}

// =============================================================================
// DEVICE KEY
// =============================================================================

/// `GENERATE_DEVICE_KEY`: creates and persists a new device key.
pub struct DeviceKeyHandler {
    storage: Arc<dyn KeyStorage>,
}

impl DeviceKeyHandler {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OperationHandler for DeviceKeyHandler {
    async fn handle(&self, _payload: Payload) -> Result<Payload, WalletError> {
        let key = KeyPair::generate();
        let spki = key.public_key().to_spki()?;
        let pkcs8 = key.to_pkcs8()?;

        let private = KeyRecord::new(KeyClass::DevicePrivate, pkcs8.to_vec());
        let public = KeyRecord::new(KeyClass::DevicePublic, spki.clone());
        if !self.storage.save(private).await? || !self.storage.save(public).await? {
            return Err(WalletError::Storage("device key rejected by storage".into()));
        }

        info!(key = %key.public_key().fingerprint(), "Device key generated");
        Ok(Payload::Bytes(spki))
    }
}

/// `GET_EXISTED_DEVICE_PUBLIC_KEY`: the persisted device public key.
pub struct ExistingDeviceKeyHandler {
    storage: Arc<dyn KeyStorage>,
}

impl ExistingDeviceKeyHandler {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OperationHandler for ExistingDeviceKeyHandler {
    async fn handle(&self, _payload: Payload) -> Result<Payload, WalletError> {
        let record = self
            .storage
            .get_public_key()
            .await?
            .ok_or(WalletError::MissingDeviceKey)?;
        Ok(Payload::Bytes(record.material().to_vec()))
    }
}

/// `SIGN_DATA`: signs the payload with the persisted device key.
pub struct SignDataHandler {
    storage: Arc<dyn KeyStorage>,
}

impl SignDataHandler {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OperationHandler for SignDataHandler {
    async fn handle(&self, payload: Payload) -> Result<Payload, WalletError> {
        let Payload::Bytes(data) = &payload else {
            return Err(WalletError::InvalidPayload(MessageType::SignData));
        };
        let record = self
            .storage
            .get_private_key()
            .await?
            .ok_or(WalletError::MissingDeviceKey)?;
        let key = KeyPair::from_pkcs8(record.material())?;
        Ok(Payload::Bytes(key.sign(data)?))
    }
}
