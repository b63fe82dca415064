//! A completed handshake.

use shared_crypto::{CryptoError, KeyPair, PublicKey};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::errors::SessionError;
use super::issuer::SessionIssuer;

/// Which side of the handshake owns this session.
#[derive(Debug)]
pub enum SessionRole {
    /// Wallet side: minted the token and re-verifies it through the issuer.
    Issuer(Arc<SessionIssuer>),
    /// Host side: received the token and compares it verbatim.
    Holder,
}

/// Local ephemeral key pair, remote ephemeral public key and session token.
///
/// The local key pair is zeroized when the session is dropped.
#[derive(Debug)]
pub struct Session {
    local: KeyPair,
    remote: PublicKey,
    session_id: String,
    role: SessionRole,
}

impl Session {
    /// Wallet side: accept a handshake from `remote`.
    ///
    /// Generates a fresh local ephemeral key pair and mints a new token,
    /// which invalidates any token previously issued by `issuer`.
    pub fn create(remote: PublicKey, issuer: &Arc<SessionIssuer>) -> Result<Self, SessionError> {
        let session_id = issuer.issue()?;
        let session = Self {
            local: KeyPair::generate(),
            remote,
            session_id,
            role: SessionRole::Issuer(Arc::clone(issuer)),
        };
        debug!(
            remote = %remote.fingerprint(),
            local = %session.local.public_key().fingerprint(),
            "Session created"
        );
        Ok(session)
    }

    /// Host side: adopt the token from a validated handshake response.
    pub fn establish(local: KeyPair, remote: PublicKey, session_id: impl Into<String>) -> Self {
        let session = Self {
            local,
            remote,
            session_id: session_id.into(),
            role: SessionRole::Holder,
        };
        debug!(remote = %remote.fingerprint(), "Session established");
        session
    }

    /// Check a candidate token against this session.
    pub fn verify_session_id(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match &self.role {
            SessionRole::Issuer(issuer) => {
                candidate == self.session_id && issuer.verify(candidate)
            }
            SessionRole::Holder => bool::from(candidate.as_bytes().ct_eq(self.session_id.as_bytes())),
        }
    }

    /// The token binding messages to this session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Counterparty key every session-bound signature is checked against.
    pub fn remote_key(&self) -> &PublicKey {
        &self.remote
    }

    /// Local ephemeral public key.
    pub fn local_public_key(&self) -> PublicKey {
        self.local.public_key()
    }

    /// Sign with the local ephemeral key.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.local.sign(message)
    }

    /// Local ephemeral key pair.
    pub fn local_key(&self) -> &KeyPair {
        &self.local
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let SessionRole::Issuer(issuer) = &self.role {
            issuer.retire(&self.session_id);
        }
        debug!("Session destroyed");
    }
}
