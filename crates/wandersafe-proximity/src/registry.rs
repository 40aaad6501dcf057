//! Process-wide table of live sessions keyed by connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use wandersafe_core::ConnectionId;

use crate::session::Session;

/// Mutable registry owned by exactly one writer (the hub task).
///
/// Keyed by [`ConnectionId`] in a `BTreeMap`, so iteration and snapshots
/// come out in connection order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<ConnectionId, Session>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the session for `session.connection_id`.
    ///
    /// Returns the session that was replaced, if any.
    pub fn upsert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.connection_id.clone(), session)
    }

    /// Delete a session. Unknown IDs are a no-op.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Session> {
        self.sessions.remove(connection_id)
    }

    /// Current session for a connection.
    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Session> {
        self.sessions.get(connection_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when no connection has reported yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Point-in-time copy, unaffected by later mutation.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            sessions: self.sessions.values().cloned().collect(),
        }
    }
}

/// Immutable, cheaply clonable view of the registry, ordered by connection.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    sessions: Arc<[Session]>,
}

impl RegistrySnapshot {
    /// Sessions in ascending [`ConnectionId`] order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Number of sessions captured.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when the snapshot holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by connection.
    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Session> {
        self.sessions
            .binary_search_by(|s| s.connection_id.cmp(connection_id))
            .ok()
            .map(|i| &self.sessions[i])
    }
}

/// Later sessions win over earlier ones with the same connection.
impl FromIterator<Session> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = Session>>(iter: I) -> Self {
        let latest: BTreeMap<ConnectionId, Session> = iter
            .into_iter()
            .map(|s| (s.connection_id.clone(), s))
            .collect();
        Self {
            sessions: latest.into_values().collect(),
        }
    }
}
