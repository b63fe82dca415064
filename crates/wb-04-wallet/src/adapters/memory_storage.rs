//! In-memory [`KeyStorage`] for tests and in-process wallets.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::errors::WalletError;
use crate::ports::outbound::{KeyClass, KeyRecord, KeyStorage};

/// Key storage backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryKeyStorage {
    records: RwLock<HashMap<&'static str, KeyRecord>>,
}

impl InMemoryKeyStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn get(&self, class: KeyClass) -> Option<KeyRecord> {
        self.records.read().get(class.record_id()).cloned()
    }
}

#[async_trait]
impl KeyStorage for InMemoryKeyStorage {
    async fn get_public_key(&self) -> Result<Option<KeyRecord>, WalletError> {
        Ok(self.get(KeyClass::DevicePublic))
    }

    async fn get_private_key(&self) -> Result<Option<KeyRecord>, WalletError> {
        Ok(self.get(KeyClass::DevicePrivate))
    }

    async fn save(&self, record: KeyRecord) -> Result<bool, WalletError> {
        self.records
            .write()
            .insert(record.class().record_id(), record);
        Ok(true)
    }
}
