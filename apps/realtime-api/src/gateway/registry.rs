//! Connection registry: which users are reachable right now.
//!
//! One live handle per user. A second connection for the same user
//! displaces the first without closing it; the displaced socket keeps
//! running until its client goes away, at which point its unregister is a
//! no-op. The registry is mutated only by the gateway server loop — chat
//! and notification fan-out read it through `lookup` and nothing else.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Metadata for one live WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            connected_at: Utc::now(),
        }
    }
}

/// Swappable registry abstraction. The in-memory implementation below is
/// the single-process default; a shared (pub/sub-backed) implementation
/// can replace it without touching chat or notification code.
pub trait ConnectionRegistry: Send + Sync {
    /// Store the mapping for a user, returning the displaced prior handle
    /// if one existed.
    fn register(&self, user_id: &str, handle: ConnectionHandle) -> Option<ConnectionHandle>;

    /// Remove the mapping only if it still belongs to this connection.
    /// Returns false when the handle was already displaced or absent.
    fn unregister(&self, user_id: &str, connection_id: &str) -> bool;

    /// The live handle for a user, if any.
    fn lookup(&self, user_id: &str) -> Option<ConnectionHandle>;

    /// Number of currently registered users.
    fn online_count(&self) -> usize;
}

/// DashMap-backed registry for a single serving process.
pub struct InMemoryRegistry {
    inner: DashMap<String, ConnectionHandle>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry for InMemoryRegistry {
    fn register(&self, user_id: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.inner.insert(user_id.to_string(), handle)
    }

    fn unregister(&self, user_id: &str, connection_id: &str) -> bool {
        self.inner
            .remove_if(user_id, |_, handle| handle.connection_id == connection_id)
            .is_some()
    }

    fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.inner.get(user_id).map(|entry| entry.value().clone())
    }

    fn online_count(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let reg = InMemoryRegistry::new();
        assert!(reg.lookup("u1").is_none());

        let prior = reg.register("u1", ConnectionHandle::new("conn_a".to_string()));
        assert!(prior.is_none());

        let handle = reg.lookup("u1").unwrap();
        assert_eq!(handle.connection_id, "conn_a");
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn second_register_displaces_first() {
        let reg = InMemoryRegistry::new();
        reg.register("u1", ConnectionHandle::new("conn_a".to_string()));

        let displaced = reg
            .register("u1", ConnectionHandle::new("conn_b".to_string()))
            .unwrap();
        assert_eq!(displaced.connection_id, "conn_a");

        // Exactly one live handle — the newer one.
        assert_eq!(reg.online_count(), 1);
        assert_eq!(reg.lookup("u1").unwrap().connection_id, "conn_b");
    }

    #[test]
    fn unregister_removes_matching_handle() {
        let reg = InMemoryRegistry::new();
        reg.register("u1", ConnectionHandle::new("conn_a".to_string()));

        assert!(reg.unregister("u1", "conn_a"));
        assert!(reg.lookup("u1").is_none());
        assert_eq!(reg.online_count(), 0);
    }

    #[test]
    fn unregister_after_displacement_is_noop() {
        let reg = InMemoryRegistry::new();
        reg.register("u1", ConnectionHandle::new("conn_a".to_string()));
        reg.register("u1", ConnectionHandle::new("conn_b".to_string()));

        // The displaced connection disconnects late — must not evict conn_b.
        assert!(!reg.unregister("u1", "conn_a"));
        assert_eq!(reg.lookup("u1").unwrap().connection_id, "conn_b");
    }

    #[test]
    fn unregister_unknown_user_is_noop() {
        let reg = InMemoryRegistry::new();
        assert!(!reg.unregister("nobody", "conn_a"));
    }
}
