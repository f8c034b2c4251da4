//! The connection ledger: every accepted socket, logged in or not.
//!
//! The registry only knows about logged-in sessions. The ledger knows about
//! everything, which is what lets the reaper find connections that never
//! logged in (or whose login was rejected) and close them once their grace
//! window is up.
//!
//! The ledger implements [`Sweep`], so it can be handed straight to
//! [`tether_sweep::spawn`].
//!
//! Once [`drain`](ConnectionLedger::drain) has run the ledger is shut: any
//! connection handed to [`track`](ConnectionLedger::track) afterwards is
//! closed on the spot instead of being recorded where nothing would ever
//! look at it again.

use std::sync::Arc;
use std::time::Duration;

use tether_sweep::Sweep;
use tether_transport::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{ConnectionInfo, TrackedConnection};

/// All tracked connections in acceptance order.
pub struct ConnectionLedger<C> {
    inner: Mutex<Entries<C>>,
    grace: Duration,
}

struct Entries<C> {
    conns: Vec<Arc<TrackedConnection<C>>>,
    open: bool,
}

impl<C: Connection> ConnectionLedger<C> {
    /// Creates an empty ledger that reaps unauthenticated connections older
    /// than `grace`.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Mutex::new(Entries {
                conns: Vec::new(),
                open: true,
            }),
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Starts tracking a freshly accepted connection.
    ///
    /// Returns `None` if the ledger has been drained. The connection is
    /// marked `Closed` and its socket closed before returning.
    pub async fn track(&self, conn: C) -> Option<Arc<TrackedConnection<C>>> {
        let tracked = Arc::new(TrackedConnection::new(conn));
        let open = {
            let mut inner = self.inner.lock().await;
            if inner.open {
                inner.conns.push(Arc::clone(&tracked));
            }
            inner.open
        };

        if !open {
            tracked.mark_closed();
            if let Err(e) = tracked.close().await {
                debug!(conn_id = %tracked.id(), error = %e, "closing refused connection failed");
            }
            debug!(conn_id = %tracked.id(), "ledger shut, connection refused");
            return None;
        }
        debug!(conn_id = %tracked.id(), "connection tracked");
        Some(tracked)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.conns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.conns.is_empty()
    }

    /// Snapshot of every tracked connection, oldest first.
    pub async fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.inner
            .lock()
            .await
            .conns
            .iter()
            .map(|conn| conn.info())
            .collect()
    }

    /// Drops every connection that has been unauthenticated for longer than
    /// the grace window and closes its socket. Returns how many were
    /// dropped.
    ///
    /// Each entry is moved to `Closed` under the ledger lock, so a login
    /// racing the reaper either authenticates first (and the entry stays)
    /// or fails to authenticate at all. Sockets are closed after the lock
    /// is released; a failed close is logged and does not stop the pass.
    pub async fn reap(&self) -> usize {
        let stale = {
            let mut inner = self.inner.lock().await;
            let mut stale = Vec::new();
            inner.conns.retain(|conn| {
                if conn.expire(self.grace) {
                    stale.push(Arc::clone(conn));
                    false
                } else {
                    true
                }
            });
            stale
        };

        for conn in &stale {
            match conn.close().await {
                Ok(_) => debug!(conn_id = %conn.id(), "reaped connection"),
                Err(e) => {
                    warn!(conn_id = %conn.id(), error = %e, "closing reaped connection failed");
                }
            }
        }

        if !stale.is_empty() {
            info!(count = stale.len(), "reaped unauthenticated connections");
        }
        stale.len()
    }

    /// Empties the ledger, shuts it to further connections and returns
    /// what it held. Used on shutdown.
    pub async fn drain(&self) -> Vec<Arc<TrackedConnection<C>>> {
        let mut inner = self.inner.lock().await;
        inner.open = false;
        std::mem::take(&mut inner.conns)
    }
}

impl<C: Connection> Sweep for ConnectionLedger<C> {
    async fn sweep(&self) -> usize {
        self.reap().await
    }
}
