//! The session hub: one object that owns all live-session state.
//!
//! A [`SessionHub`] is created explicitly with [`SessionHub::start`] and
//! shared as `Arc` by the accept loop, every connection task and whatever
//! application code wants to push messages. It owns:
//!
//! - the [`SessionRegistry`] (identity → connection)
//! - the [`ConnectionLedger`] (every accepted socket)
//! - the [`Router`] built on the registry
//! - the reaper: a [`tether_sweep`] task sweeping the ledger
//!
//! [`shutdown`](SessionHub::shutdown) stops the reaper and closes every
//! connection it knows about.

use std::sync::Arc;

use serde::Serialize;
use tether_session::{
    ConnectionInfo, ConnectionLedger, SessionConfig, SessionRegistry,
};
use tether_sweep::{SweepConfig, SweepHandle, SweepWaker};
use tether_transport::Connection;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::router::{Delivery, Router};
use crate::TetherError;

/// Serializable summary of a hub, for status endpoints and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub running: bool,
    /// Logged-in identities, sorted.
    pub identities: Vec<String>,
    /// Tracked connections, logged in or not.
    pub connections: usize,
    pub reaper: ReaperStatus,
}

/// Reaper counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaperStatus {
    pub timer_runs: u64,
    pub wake_runs: u64,
    pub reaped: u64,
}

/// Owns the registry, ledger, router and reaper for one server.
pub struct SessionHub<C> {
    config: SessionConfig,
    registry: Arc<SessionRegistry<C>>,
    ledger: Arc<ConnectionLedger<C>>,
    router: Router<C>,
    reaper: SweepHandle,
    running: watch::Sender<bool>,
}

impl<C: Connection> SessionHub<C> {
    /// Creates a hub and starts its reaper.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn start(config: SessionConfig) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let ledger = Arc::new(ConnectionLedger::new(config.auth_grace));
        let reaper = tether_sweep::spawn(
            Arc::clone(&ledger),
            SweepConfig::with_interval(config.sweep_interval),
        );
        let (running, _) = watch::channel(true);

        info!(
            auth_grace = ?config.auth_grace,
            sweep_interval = ?config.sweep_interval,
            "session hub started"
        );

        Arc::new(Self {
            router: Router::new(Arc::clone(&registry)),
            config,
            registry,
            ledger,
            reaper,
            running,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry<C> {
        &self.registry
    }

    pub fn ledger(&self) -> &ConnectionLedger<C> {
        &self.ledger
    }

    pub fn router(&self) -> &Router<C> {
        &self.router
    }

    /// A handle for requesting an immediate reaper sweep.
    pub fn reaper_waker(&self) -> SweepWaker {
        self.reaper.waker()
    }

    /// Pushes `value` to `router` as a system frame.
    ///
    /// Dropped silently (returning [`Delivery::NoRecipient`]) if nobody is
    /// logged in under that identity.
    pub async fn send(
        &self,
        router: &str,
        correlation_id: &str,
        value: &str,
    ) -> Result<Delivery, TetherError> {
        Ok(self.router.send(router, correlation_id, value).await?)
    }

    /// Every tracked connection, oldest first.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.ledger.snapshot().await
    }

    pub async fn status(&self) -> HubStatus {
        let reaper = self.reaper.stats();
        HubStatus {
            running: self.is_running(),
            identities: self.registry.identities().await,
            connections: self.ledger.len().await,
            reaper: ReaperStatus {
                timer_runs: reaper.timer_runs,
                wake_runs: reaper.wake_runs,
                reaped: reaper.removed,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub async fn stopped(&self) {
        let mut running = self.running.subscribe();
        let _ = running.wait_for(|r| !*r).await;
    }

    /// Stops the reaper and closes every connection. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) {
        if !self.running.send_replace(false) {
            return;
        }
        self.reaper.shutdown().await;

        // Registered connections are also in the ledger; drain both so
        // nothing keeps a reference, then close the ledger's set.
        self.registry.drain().await;
        let conns = self.ledger.drain().await;
        for conn in &conns {
            conn.mark_closed();
            if let Err(e) = conn.close().await {
                debug!(conn_id = %conn.id(), error = %e, "close on shutdown failed");
            }
        }
        info!(closed = conns.len(), "session hub stopped");
    }
}
