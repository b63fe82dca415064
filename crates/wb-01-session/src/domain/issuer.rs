//! Self-certifying session tokens.
//!
//! A token is `hex(nonce || seal(timestamp))`, sealed with XChaCha20-Poly1305
//! under the issuer's private key and bound to [`SESSION_TOKEN_CONTEXT`] as
//! associated data. Verification opens the token and compares the timestamp
//! to the last one issued.

use parking_lot::Mutex;
use shared_crypto::symmetric::NONCE_LEN;
use shared_crypto::{open, seal, Nonce, SecretKey};
use shared_types::TimeSource;
use std::sync::Arc;
use tracing::debug;

use super::errors::SessionError;

/// Associated data bound into every token.
pub const SESSION_TOKEN_CONTEXT: &[u8] = b"wallet-bridge/session-id/v1";

/// Mints and re-verifies session tokens.
///
/// One issuer supports exactly one live token: issuing a new one invalidates
/// the previous.
pub struct SessionIssuer {
    key: SecretKey,
    state: Mutex<IssuerState>,
    clock: Arc<dyn TimeSource>,
}

#[derive(Debug, Default)]
struct IssuerState {
    /// Timestamp sealed in the live token.
    live: Option<u64>,
    /// Highest timestamp ever sealed; survives retirement.
    high_water: Option<u64>,
}

impl SessionIssuer {
    /// Create an issuer with a fresh random key.
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            key: SecretKey::generate(),
            state: Mutex::new(IssuerState::default()),
            clock,
        }
    }

    /// Mint a new token, invalidating the previous one.
    ///
    /// The sealed timestamp is strictly greater than any previously issued
    /// one, even if the clock has not advanced.
    pub fn issue(&self) -> Result<String, SessionError> {
        let mut state = self.state.lock();
        let now = self.clock.now_ms();
        let issued_at = match state.high_water {
            Some(prev) if now <= prev => prev + 1,
            _ => now,
        };

        let (ciphertext, nonce) = seal(
            &self.key,
            issued_at.to_string().as_bytes(),
            SESSION_TOKEN_CONTEXT,
        )?;
        state.live = Some(issued_at);
        state.high_water = Some(issued_at);

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(nonce.as_bytes());
        token.extend_from_slice(&ciphertext);

        debug!(issued_at, "Session token issued");
        Ok(hex::encode(token))
    }

    /// True only for the most recently issued, not yet retired token.
    pub fn verify(&self, token: &str) -> bool {
        let Some(candidate) = self.open_token(token) else {
            return false;
        };
        self.state.lock().live == Some(candidate)
    }

    /// Forget `token` if it is still the latest one.
    pub fn retire(&self, token: &str) {
        let Some(candidate) = self.open_token(token) else {
            return;
        };
        let mut state = self.state.lock();
        if state.live == Some(candidate) {
            state.live = None;
            debug!(issued_at = candidate, "Session token retired");
        }
    }

    /// Timestamp sealed in the live token, if any.
    pub fn last_issued(&self) -> Option<u64> {
        self.state.lock().live
    }

    fn open_token(&self, token: &str) -> Option<u64> {
        let raw = hex::decode(token).ok()?;
        if raw.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce).ok()?;
        let plaintext = open(&self.key, ciphertext, &nonce, SESSION_TOKEN_CONTEXT).ok()?;
        std::str::from_utf8(&plaintext).ok()?.parse().ok()
    }
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("last", &self.last_issued())
            .finish_non_exhaustive()
    }
}
