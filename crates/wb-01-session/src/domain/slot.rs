//! The single live session of an endpoint.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::session::Session;

/// Holds at most one live [`Session`].
///
/// Readers get an `Arc` snapshot. Replacing or clearing the slot does not
/// affect a snapshot already taken; the old session (and its key material)
/// is destroyed when the last snapshot is dropped.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session`, returning the one it replaced.
    pub fn replace(&self, session: Session) -> Option<Arc<Session>> {
        let next = Arc::new(session);
        let previous = self.current.write().replace(next);
        info!(replaced = previous.is_some(), "Session installed");
        previous
    }

    /// Drop back to no-session, returning the session that was live.
    pub fn clear(&self) -> Option<Arc<Session>> {
        let previous = self.current.write().take();
        if previous.is_some() {
            info!("Session cleared");
        }
        previous
    }

    /// Snapshot of the live session.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    /// Whether a session is live.
    pub fn is_established(&self) -> bool {
        self.current.read().is_some()
    }
}
