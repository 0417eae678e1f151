//! The global connection registry (`spec.md` §4.5, §9).

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::CoreError;

/// Identifies one registered connection, assigned at registration and
/// included in log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Tracks live connections for transfer-count limits (`spec.md` §9).
///
/// `spec.md` deliberately models this as an injected service rather than a
/// true global so the dispatcher can be exercised with a fake in tests.
pub trait ConnectionRegistry: Send + Sync {
    /// Registers a new connection for `username`, or rejects it (e.g. the
    /// maximum connection count has been reached).
    fn register(&self, username: &str) -> Result<ConnectionId, CoreError>;

    /// Deregisters a previously registered connection. Always called,
    /// even on the failure path (`spec.md` §4.5).
    fn deregister(&self, id: ConnectionId);
}

/// A [`ConnectionRegistry`] backed by an in-process concurrent map, for a
/// single server process hosting many SSH-channel tasks concurrently
/// (`spec.md` §5).
pub struct InProcessConnectionRegistry {
    next_id: AtomicU64,
    max_connections: Option<usize>,
    connections: DashMap<ConnectionId, String>,
}

impl InProcessConnectionRegistry {
    /// Creates an empty registry. `max_connections` of `None` means
    /// unbounded.
    #[must_use]
    pub fn new(max_connections: Option<usize>) -> Self {
        InProcessConnectionRegistry {
            next_id: AtomicU64::new(1),
            max_connections,
            connections: DashMap::new(),
        }
    }

    /// The number of currently registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// `true` if no connections are currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for InProcessConnectionRegistry {
    fn default() -> Self {
        InProcessConnectionRegistry::new(None)
    }
}

impl ConnectionRegistry for InProcessConnectionRegistry {
    fn register(&self, username: &str) -> Result<ConnectionId, CoreError> {
        if let Some(max) = self.max_connections {
            if self.connections.len() >= max {
                return Err(CoreError::QuotaExceeded(
                    "maximum number of connections reached".to_owned(),
                ));
            }
        }
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(id, username.to_owned());
        #[cfg(feature = "tracing")]
        tracing::info!(conn = id.0, user = username, "connection registered");
        Ok(id)
    }

    fn deregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
        #[cfg(feature = "tracing")]
        tracing::info!(conn = id.0, "connection deregistered");
    }
}
