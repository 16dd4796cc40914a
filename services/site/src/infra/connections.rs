use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Server-generated identifier of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Request metadata captured when a connection opens.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMeta {
    pub user_agent: Option<String>,
    pub last_event_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub meta: ConnectionMeta,
    pub opened_at: DateTime<Utc>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub live: usize,
    /// Connections opened with a `Last-Event-ID` header.
    pub resumed: usize,
    pub oldest_age_secs: u64,
}

/// Live stream connections, keyed by id.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, ConnectionInfo>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the guard that owns its lifetime.
    pub fn register(&self, meta: ConnectionMeta, cancel: CancellationToken) -> ConnectionGuard {
        let id = ConnectionId::new();
        self.connections.insert(
            id,
            ConnectionInfo {
                meta,
                opened_at: Utc::now(),
                cancel: cancel.clone(),
            },
        );
        ConnectionGuard {
            id,
            cancel,
            registry: self.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Point-in-time summary of the live connections.
    pub fn stats(&self, now: DateTime<Utc>) -> ConnectionStats {
        let mut stats = ConnectionStats::default();
        for entry in self.connections.iter() {
            stats.live += 1;
            if entry.meta.last_event_id.is_some() {
                stats.resumed += 1;
            }
            let age = (now - entry.opened_at).num_seconds().max(0) as u64;
            stats.oldest_age_secs = stats.oldest_age_secs.max(age);
        }
        stats
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Cancel one connection from outside its task. Returns whether it was live.
    pub fn terminate(&self, id: ConnectionId) -> bool {
        match self.connections.get(&id) {
            Some(info) => {
                info.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn unregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("live", &self.connections.len())
            .finish()
    }
}

/// Owns one registry entry. Dropping it cancels the connection and removes the entry;
/// both steps are idempotent.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    cancel: CancellationToken,
    registry: ConnectionRegistry,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn close(&self) {
        self.cancel.cancel();
        self.registry.unregister(self.id);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}
