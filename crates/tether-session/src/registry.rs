//! The session registry: who is logged in, and on which connection.
//!
//! At most one connection per identity. A second login for an identity
//! that is already registered *evicts* the older connection: it is sent the
//! notice `close`, its socket is closed, and the new connection takes its
//! place. The registry never hands out a connection it has evicted.
//!
//! # Concurrency
//!
//! The map sits behind a Tokio `RwLock`. Lookups (one per routed frame)
//! share the lock; registration and removal take it exclusively. The swap
//! and the `Closed` transition of the evicted connection happen under the
//! write lock, so two logins for the same identity are strictly ordered.
//! The notice and socket close go out after the lock is released, each
//! bounded by [`EVICTION_TIMEOUT`], so a peer that stopped reading only
//! stalls its own replacement's login and never the whole map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tether_protocol::EVICTION_NOTICE;
use tether_transport::{Connection, ConnectionId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{SessionError, TrackedConnection};

/// How long each step of an eviction (notice, close) may take.
pub const EVICTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity → live connection map.
pub struct SessionRegistry<C> {
    sessions: RwLock<HashMap<String, Arc<TrackedConnection<C>>>>,
}

impl<C: Connection> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the connection registered for `identity`, if any.
    pub async fn lookup(
        &self,
        identity: &str,
    ) -> Option<Arc<TrackedConnection<C>>> {
        self.sessions.read().await.get(identity).cloned()
    }

    /// Makes `conn` the session for `identity`.
    ///
    /// If another connection held the identity it is evicted (notice sent,
    /// state `Closed`, socket closed) and returned. Re-registering the same
    /// connection is a no-op that evicts nothing.
    ///
    /// # Errors
    /// [`SessionError::ConnectionClosed`] if `conn`'s socket has already
    /// been closed (typically by the reaper while its login was being
    /// verified). The registry is left unchanged.
    pub async fn register(
        &self,
        identity: &str,
        conn: Arc<TrackedConnection<C>>,
    ) -> Result<Option<Arc<TrackedConnection<C>>>, SessionError> {
        let evicted = {
            let mut sessions = self.sessions.write().await;

            if conn.is_socket_closed() {
                return Err(SessionError::ConnectionClosed(conn.id()));
            }

            match sessions.insert(identity.to_string(), Arc::clone(&conn)) {
                Some(prev) if prev.id() != conn.id() => {
                    prev.mark_closed();
                    Some(prev)
                }
                _ => None,
            }
        };
        info!(%identity, conn_id = %conn.id(), "session registered");

        if let Some(prev) = &evicted {
            evict(identity, prev).await;
        }
        Ok(evicted)
    }

    /// Removes the entry for `identity` if it still refers to `conn_id`.
    ///
    /// A connection that was evicted must not take its replacement's entry
    /// with it on the way out, hence the id check. Returns `true` if
    /// something was removed.
    pub async fn remove(&self, identity: &str, conn_id: ConnectionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(identity) {
            Some(current) if current.id() == conn_id => {
                sessions.remove(identity);
                info!(%identity, %conn_id, "session removed");
                true
            }
            _ => {
                debug!(%identity, %conn_id, "stale remove ignored");
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Identities currently registered, sorted.
    pub async fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Empties the registry and returns what it held. Used on shutdown.
    pub async fn drain(&self) -> Vec<Arc<TrackedConnection<C>>> {
        self.sessions
            .write()
            .await
            .drain()
            .map(|(_, conn)| conn)
            .collect()
    }
}

/// Sends the notice and closes the socket of a connection that has already
/// been swapped out and marked `Closed`.
async fn evict<C: Connection>(identity: &str, prev: &TrackedConnection<C>) {
    let conn_id = prev.id();
    match tokio::time::timeout(EVICTION_TIMEOUT, prev.send(EVICTION_NOTICE)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(%identity, %conn_id, error = %e, "eviction notice not delivered");
        }
        Err(_) => warn!(%identity, %conn_id, "eviction notice timed out"),
    }
    match tokio::time::timeout(EVICTION_TIMEOUT, prev.close()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            debug!(%identity, %conn_id, error = %e, "evicted socket close failed");
        }
        Err(_) => warn!(%identity, %conn_id, "evicted socket close timed out"),
    }
    info!(%identity, %conn_id, "previous session evicted");
}
