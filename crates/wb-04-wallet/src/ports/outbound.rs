//! Driven port: persistent key storage.

use async_trait::async_trait;
use std::fmt;
use zeroize::Zeroizing;

use crate::domain::errors::WalletError;

/// Kind of key material, each stored under one fixed record id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// SPKI bytes of the device key.
    DevicePublic,
    /// PKCS#8 bytes of the device key.
    DevicePrivate,
}

impl KeyClass {
    /// Fixed storage record id.
    pub fn record_id(&self) -> &'static str {
        match self {
            KeyClass::DevicePublic => "device-public-key",
            KeyClass::DevicePrivate => "device-private-key",
        }
    }
}

/// Opaque stored key material.
///
/// The bytes are zeroized when the record is dropped.
#[derive(Clone)]
pub struct KeyRecord {
    class: KeyClass,
    material: Zeroizing<Vec<u8>>,
}

impl KeyRecord {
    /// Wrap key material.
    pub fn new(class: KeyClass, material: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            material: Zeroizing::new(material.into()),
        }
    }

    /// Kind of key.
    pub fn class(&self) -> KeyClass {
        self.class
    }

    /// Raw bytes.
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("class", &self.class)
            .field("len", &self.material.len())
            .finish()
    }
}

/// Persistent key store keyed by [`KeyClass::record_id`].
#[async_trait]
pub trait KeyStorage: Send + Sync {
    /// Stored device public key, if any.
    async fn get_public_key(&self) -> Result<Option<KeyRecord>, WalletError>;

    /// Stored device private key, if any.
    async fn get_private_key(&self) -> Result<Option<KeyRecord>, WalletError>;

    /// Store `record` under its class id, replacing what was there.
    ///
    /// Returns whether the store accepted the record.
    async fn save(&self, record: KeyRecord) -> Result<bool, WalletError>;
}
