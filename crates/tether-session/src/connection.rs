//! Tracked connections: the server's record of one accepted socket.
//!
//! A [`TrackedConnection`] wraps whatever [`Connection`] the transport
//! produced and adds what the session layer needs to know about it:
//!
//! - WHEN it was accepted (wall clock for listings, monotonic for the
//!   reaper's grace check)
//! - WHERE it is in the login lifecycle ([`LifecycleState`])
//! - WHO it belongs to, once a login has been accepted
//!
//! The same `Arc<TrackedConnection>` is held by the ledger from the moment
//! the socket is accepted, and by the registry while it is the live
//! session for its identity.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tether_transport::{Connection, ConnectionId, TransportError};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Where a connection is in the login lifecycle.
///
/// ```text
///   New ──(first frame)──→ AuthPending ──(accepted)──→ Authenticated
///                              │                             │
///                              └──(bad login / rejected)──┐  │ (read error,
///                                                         ▼  ▼  eviction)
///                                                        Closed
/// ```
///
/// Only `Authenticated` connections are exempt from reaping. `Closed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Accepted, nothing read yet.
    New,
    /// First frame read, login being checked.
    AuthPending,
    /// Logged in and registered.
    Authenticated,
    /// Done; waiting to be reaped or already gone.
    Closed,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::AuthPending,
            2 => Self::Authenticated,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::New => 0,
            Self::AuthPending => 1,
            Self::Authenticated => 2,
            Self::Closed => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionInfo
// ---------------------------------------------------------------------------

/// Serializable snapshot of one tracked connection, as listed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub id: u64,
    pub identity: Option<String>,
    pub state: LifecycleState,
    pub authenticated: bool,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    pub peer_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
}

// ---------------------------------------------------------------------------
// TrackedConnection
// ---------------------------------------------------------------------------

/// One accepted socket plus its lifecycle bookkeeping.
///
/// All state lives in atomics so the reaper, the registry and the
/// connection's own task can read it without locking.
pub struct TrackedConnection<C> {
    conn: C,
    created_at: u64,
    accepted_at: Instant,
    state: AtomicU8,
    identity: OnceLock<String>,
    socket_closed: AtomicBool,
}

impl<C: Connection> TrackedConnection<C> {
    /// Starts tracking a freshly accepted connection in state `New`.
    pub fn new(conn: C) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            conn,
            created_at,
            accepted_at: Instant::now(),
            state: AtomicU8::new(LifecycleState::New.as_u8()),
            identity: OnceLock::new(),
            socket_closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Acceptance time in seconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed()
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the connection is a logged-in session.
    pub fn is_authenticated(&self) -> bool {
        self.state() == LifecycleState::Authenticated
    }

    /// The identity this connection logged in as. Stays set after the
    /// connection closes so the owner can still be named in logs.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get().map(String::as_str)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.conn.peer_addr()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.conn.local_addr()
    }

    /// `New → AuthPending`. Returns `false` if the connection was not new.
    pub fn begin_auth(&self) -> bool {
        self.transition(LifecycleState::New, LifecycleState::AuthPending)
    }

    /// `AuthPending → Authenticated`, recording the identity.
    ///
    /// Returns `false` (and changes nothing) if the connection was not
    /// waiting on a login, e.g. because it was closed meanwhile.
    pub fn authenticate(&self, identity: &str) -> bool {
        if !self.transition(
            LifecycleState::AuthPending,
            LifecycleState::Authenticated,
        ) {
            return false;
        }
        // An identity is only ever set on this single transition.
        let _ = self.identity.set(identity.to_string());
        true
    }

    /// Moves to `Closed` from any state. The socket is left alone.
    pub fn mark_closed(&self) {
        self.state
            .store(LifecycleState::Closed.as_u8(), Ordering::Release);
    }

    /// Claims the connection for the reaper if it has been unauthenticated
    /// for longer than `grace`.
    ///
    /// A `New` or `AuthPending` connection is moved to `Closed` in the same
    /// atomic step, so a login that finishes afterwards can no longer
    /// authenticate it. Returns `true` if the connection is (now) `Closed`
    /// and past grace, `false` if it is authenticated or still within grace.
    pub fn expire(&self, grace: Duration) -> bool {
        if self.age() <= grace {
            return false;
        }
        let closed = LifecycleState::Closed.as_u8();
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            match LifecycleState::from_u8(current) {
                LifecycleState::Authenticated => return false,
                LifecycleState::Closed => return true,
                LifecycleState::New | LifecycleState::AuthPending => {}
            }
            match self.state.compare_exchange(
                current,
                closed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_socket_closed(&self) -> bool {
        self.socket_closed.load(Ordering::Acquire)
    }

    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.conn.send(data).await
    }

    pub async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        self.conn.recv().await
    }

    /// Closes the socket once. Later calls do nothing and return
    /// `Ok(false)`.
    pub async fn close(&self) -> Result<bool, TransportError> {
        if self.socket_closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.conn.close().await?;
        Ok(true)
    }

    /// Snapshot for listings.
    pub fn info(&self) -> ConnectionInfo {
        let state = self.state();
        ConnectionInfo {
            id: self.id().into_inner(),
            identity: self.identity().map(str::to_string),
            state,
            authenticated: state == LifecycleState::Authenticated,
            created_at: self.created_at,
            peer_addr: self.peer_addr(),
            local_addr: self.local_addr(),
        }
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(
                from.as_u8(),
                to.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl<C> std::fmt::Debug for TrackedConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedConnection")
            .field(
                "state",
                &LifecycleState::from_u8(self.state.load(Ordering::Relaxed)),
            )
            .field("identity", &self.identity.get())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_transport::MemoryConnection;

    fn tracked() -> TrackedConnection<MemoryConnection> {
        let (conn, _peer) = MemoryConnection::pair();
        TrackedConnection::new(conn)
    }

    // =====================================================================
    // Lifecycle transitions
    // =====================================================================

    #[test]
    fn test_new_connection_starts_unauthenticated() {
        let conn = tracked();
        assert_eq!(conn.state(), LifecycleState::New);
        assert!(!conn.is_authenticated());
        assert!(conn.identity().is_none());
    }

    #[test]
    fn test_begin_auth_only_from_new() {
        let conn = tracked();
        assert!(conn.begin_auth());
        assert_eq!(conn.state(), LifecycleState::AuthPending);
        assert!(!conn.begin_auth());
    }

    #[test]
    fn test_authenticate_sets_identity() {
        let conn = tracked();
        conn.begin_auth();
        assert!(conn.authenticate("alice"));
        assert!(conn.is_authenticated());
        assert_eq!(conn.identity(), Some("alice"));
    }

    #[test]
    fn test_authenticate_without_pending_login_is_refused() {
        let conn = tracked();
        assert!(!conn.authenticate("alice"));
        assert!(conn.identity().is_none());
    }

    #[test]
    fn test_authenticate_after_close_is_refused() {
        let conn = tracked();
        conn.begin_auth();
        conn.mark_closed();
        assert!(!conn.authenticate("alice"));
        assert_eq!(conn.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_mark_closed_keeps_identity() {
        let conn = tracked();
        conn.begin_auth();
        conn.authenticate("alice");
        conn.mark_closed();
        assert!(!conn.is_authenticated());
        assert_eq!(conn.identity(), Some("alice"));
    }

    // =====================================================================
    // Staleness
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_expire_after_grace_closes_unauthenticated() {
        let conn = tracked();
        let grace = Duration::from_secs(5);
        assert!(!conn.expire(grace));
        assert_eq!(conn.state(), LifecycleState::New);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(conn.expire(grace));
        assert_eq!(conn.state(), LifecycleState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_never_for_authenticated() {
        let conn = tracked();
        conn.begin_auth();
        conn.authenticate("alice");

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!conn.expire(Duration::from_secs(5)));
        assert!(conn.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_pending_login_cannot_authenticate_afterwards() {
        let conn = tracked();
        conn.begin_auth();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(conn.expire(Duration::from_secs(5)));
        assert!(!conn.authenticate("alice"));
        assert_eq!(conn.state(), LifecycleState::Closed);
        assert!(conn.identity().is_none());
    }

    // =====================================================================
    // Socket
    // =====================================================================

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, peer) = MemoryConnection::pair();
        let conn = TrackedConnection::new(conn);

        assert!(conn.close().await.unwrap());
        assert!(!conn.close().await.unwrap());
        assert!(conn.is_socket_closed());
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (conn, mut peer) = MemoryConnection::pair();
        let conn = TrackedConnection::new(conn);

        conn.send(b"hi").await.unwrap();
        assert_eq!(peer.recv().await, Some(b"hi".to_vec()));
    }

    #[test]
    fn test_info_reflects_state() {
        let conn = tracked();
        conn.begin_auth();
        conn.authenticate("bob");

        let info = conn.info();
        assert_eq!(info.id, conn.id().into_inner());
        assert_eq!(info.identity.as_deref(), Some("bob"));
        assert_eq!(info.state, LifecycleState::Authenticated);
        assert!(info.authenticated);
        assert!(info.peer_addr.is_none());
    }
}
