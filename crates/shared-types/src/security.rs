//! # Replay and Freshness Primitives
//!
//! State the validator pipeline consults before trusting an envelope:
//! a clock, the freshness window and the two replay registries.
//!
//! ## Security Properties
//!
//! - **Freshness**: A timestamp is accepted only when `now - 5000ms <= ts <= now`.
//! - **Nonce Replay Prevention**: Each nonce is accepted once per endpoint.
//! - **Request Id Uniqueness**: Each request id is accepted once per endpoint.
//!
//! Registries live for the lifetime of their endpoint and are never evicted.
//! Entries older than the freshness window are unreachable anyway, because
//! their envelopes fail the timestamp check first.

use crate::errors::ConfigError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum age of an accepted envelope (milliseconds).
pub const TIMESTAMP_TOLERANCE_MS: u64 = 5_000;

// =============================================================================
// TIME SOURCE
// =============================================================================

/// Clock port.
///
/// Production code uses [`SystemTimeSource`]; tests inject a
/// [`FixedTimeSource`] to exercise the freshness boundaries exactly.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now: AtomicU64,
}

impl FixedTimeSource {
    /// Create a clock frozen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the epoch.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// TIMESTAMP VALIDATION
// =============================================================================

/// Validation knobs shared by every pipeline run of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Maximum accepted envelope age in milliseconds.
    pub timestamp_tolerance_ms: u64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            timestamp_tolerance_ms: TIMESTAMP_TOLERANCE_MS,
        }
    }
}

impl ValidationPolicy {
    /// Reject a zero tolerance (every envelope would be stale on arrival).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timestamp_tolerance_ms == 0 {
            return Err(ConfigError::Invalid(
                "timestamp_tolerance_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Check that `timestamp` is neither in the future nor older than `tolerance_ms`.
///
/// An age of exactly `tolerance_ms` is accepted.
pub fn validate_timestamp(timestamp: u64, now: u64, tolerance_ms: u64) -> bool {
    if timestamp > now {
        return false;
    }
    now - timestamp <= tolerance_ms
}

// =============================================================================
// REPLAY REGISTRY
// =============================================================================

/// Set of tokens already accepted by one endpoint.
///
/// ## Usage
///
/// ```rust,ignore
/// let registry = ReplayRegistry::new();
///
/// assert!(registry.check_and_insert("n-1"));  // fresh
/// assert!(!registry.check_and_insert("n-1")); // replay
/// ```
#[derive(Debug, Default)]
pub struct ReplayRegistry {
    seen: Mutex<HashSet<String>>,
}

impl ReplayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically test-and-record a token.
    ///
    /// Returns `true` if the token was fresh, `false` on a replay. Two
    /// concurrent calls with the same token never both return `true`.
    pub fn check_and_insert(&self, token: &str) -> bool {
        self.seen.lock().insert(token.to_string())
    }

    /// Whether a token has been recorded.
    pub fn contains(&self, token: &str) -> bool {
        self.seen.lock().contains(token)
    }

    /// Number of recorded tokens.
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nonce and request-id registries owned by one endpoint.
#[derive(Debug, Default)]
pub struct ReplayRegistries {
    /// Seen nonces.
    pub nonces: ReplayRegistry,
    /// Seen request ids.
    pub request_ids: ReplayRegistry,
}

impl ReplayRegistries {
    /// Creates empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates registries wrapped in Arc for shared ownership.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

// =============================================================================
// IDENTIFIER FORMAT
// =============================================================================

/// True if `value` is a hyphenated version-4 UUID.
pub fn is_uuid_v4(value: &str) -> bool {
    if value.len() != 36 {
        return false;
    }
    match Uuid::parse_str(value) {
        Ok(id) => id.get_version_num() == 4 && id.get_variant() == uuid::Variant::RFC4122,
        Err(_) => false,
    }
}
