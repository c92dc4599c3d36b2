//! Connection registry
//!
//! Maps each online username to its delivery handle using DashMap, so every
//! operation is atomic per key and no global lock is held while delivering.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::connection::Connection;
use crate::types::{ConnectionId, Username};

/// Who is online, and how to reach them
///
/// One instance is shared by every connection task. Tests create their own.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Username, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Bind a connection under its username
    ///
    /// A previous connection with the same name is replaced, not closed,
    /// and returned to the caller.
    pub fn bind(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let username = connection.username().clone();
        let previous = self.connections.insert(username.clone(), connection);

        if let Some(previous) = &previous {
            debug!(
                username = %username,
                replaced = %previous.id(),
                "Replaced existing binding"
            );
        }

        previous
    }

    /// Remove whatever is bound under `username`
    pub fn unbind(&self, username: &str) -> Option<Arc<Connection>> {
        self.connections.remove(username).map(|(_, conn)| conn)
    }

    /// Remove the binding only if it still points at `connection_id`
    ///
    /// Returns true if something was removed.
    pub fn unbind_connection(&self, username: &str, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(username, |_, conn| conn.id() == connection_id)
            .is_some()
    }

    pub fn resolve(&self, username: &str) -> Option<Arc<Connection>> {
        self.connections.get(username).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.connections.contains_key(username)
    }

    /// Snapshot of every bound handle, for broadcast
    pub fn all_handles(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connection(name: &str) -> (Arc<Connection>, mpsc::Receiver<crate::message::ChatMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let conn = Connection::new(Username::new(name).unwrap(), tx);
        (Arc::new(conn), rx)
    }

    #[test]
    fn test_bind_and_resolve() {
        let registry = ConnectionRegistry::new();
        let (alice, _rx) = connection("alice");

        assert!(!registry.is_online("alice"));
        assert!(registry.bind(alice.clone()).is_none());
        assert!(registry.is_online("alice"));
        assert_eq!(registry.resolve("alice").unwrap().id(), alice.id());
        assert!(registry.resolve("bob").is_none());
    }

    #[test]
    fn test_unbind_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unbind("ghost").is_none());
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_rebind_replaces_without_closing() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = connection("alice");
        let (second, _rx2) = connection("alice");

        registry.bind(first.clone());
        let replaced = registry.bind(second.clone()).unwrap();

        assert_eq!(replaced.id(), first.id());
        assert!(first.is_open());
        assert_eq!(registry.resolve("alice").unwrap().id(), second.id());
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn test_stale_unbind_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = connection("alice");
        let (second, _rx2) = connection("alice");

        registry.bind(first.clone());
        registry.bind(second.clone());

        assert!(!registry.unbind_connection("alice", first.id()));
        assert!(registry.is_online("alice"));

        assert!(registry.unbind_connection("alice", second.id()));
        assert!(!registry.is_online("alice"));
    }

    #[test]
    fn test_online_state_follows_last_operation() {
        let registry = ConnectionRegistry::new();
        let (alice, _rx) = connection("alice");

        for _ in 0..3 {
            registry.bind(alice.clone());
            assert!(registry.is_online("alice"));
            registry.unbind("alice");
            assert!(!registry.is_online("alice"));
        }
    }

    #[test]
    fn test_all_handles_snapshot() {
        let registry = ConnectionRegistry::new();
        let (alice, _rx1) = connection("alice");
        let (bob, _rx2) = connection("bob");
        registry.bind(alice);
        registry.bind(bob);

        let snapshot = registry.all_handles();
        registry.unbind("bob");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.all_handles().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_bind_unbind() {
        let registry = ConnectionRegistry::new_shared();
        let mut tasks = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (conn, _rx) = connection(&format!("user{}", i));
                for _ in 0..100 {
                    registry.bind(conn.clone());
                    let _ = registry.all_handles();
                    registry.unbind(conn.username().as_str());
                }
                registry.bind(conn);
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.online_count(), 16);
    }
}
