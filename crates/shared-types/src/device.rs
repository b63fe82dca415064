//! # Device Identity
//!
//! The stable identifier both sides stamp into `deviceId`. The wallet only
//! accepts envelopes carrying the id it was configured with.

use sha2::{Digest, Sha256};

/// Source of the local device identifier.
pub trait DeviceIdentity: Send + Sync {
    /// Stable identifier for this device.
    fn device_id(&self) -> String;
}

/// Identifier supplied verbatim by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDeviceIdentity(String);

impl StaticDeviceIdentity {
    /// Wrap a configured identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl DeviceIdentity for StaticDeviceIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}

/// Identifier derived from host environment components.
///
/// Components are hashed with SHA-256 in order, each followed by a zero
/// byte, so `["ab", "c"]` and `["a", "bc"]` give different ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintDeviceIdentity(String);

impl FingerprintDeviceIdentity {
    /// Derive from an ordered list of components.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for c in components {
            hasher.update(c.as_ref().as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }
}

impl DeviceIdentity for FingerprintDeviceIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}
