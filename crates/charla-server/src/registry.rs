//! Joined-session registry.
//!
//! Maps connection id → display name for every connection that is open AND
//! has sent a join event. Connections that never join are tracked only by
//! the transport. The lock is held for the duration of a single map
//! operation and never across an `.await`.

use std::collections::HashMap;

use charla_core::ConnectionId;
use parking_lot::RwLock;

/// Display names of joined sessions, keyed by connection id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    names: RwLock<HashMap<ConnectionId, String>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` for `id`, replacing any previous name.
    pub fn join(&self, id: ConnectionId, name: String) {
        let _ = self.names.write().insert(id, name);
    }

    /// Remove `id`, returning the name it had joined under.
    ///
    /// `None` for connections that never joined or already left.
    pub fn leave(&self, id: &ConnectionId) -> Option<String> {
        self.names.write().remove(id)
    }

    /// Current display name for `id`.
    pub fn lookup(&self, id: &ConnectionId) -> Option<String> {
        self.names.read().get(id).cloned()
    }

    /// Every joined display name, in no particular order.
    pub fn snapshot(&self) -> Vec<String> {
        self.names.read().values().cloned().collect()
    }

    /// Whether `id` has joined.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.names.read().contains_key(id)
    }

    /// Number of joined sessions.
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Whether no session has joined.
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}
