//! Transport abstraction layer for Tether.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the socket a client talks to us through. Everything above this crate
//! (sessions, routing) only ever sees "a connection that can send, receive
//! and close", so the same lifecycle code runs over a real WebSocket or an
//! in-process [`MemoryConnection`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryPeer};
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter shared by every transport so ids stay unique per process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only takes the socket off the listener. Any protocol handshake
/// happens in [`Incoming::establish`], which the caller runs on its own
/// task so a slow client never holds up the listener.
pub trait Transport: Send + Sync + 'static {
    /// The accepted-but-not-yet-established socket.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A socket taken off the listener that still has to finish its handshake.
pub trait Incoming: Send + 'static {
    /// The connection this socket turns into.
    type Connection: Connection;

    /// Address of the remote peer, if the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Completes the handshake. Implementations bound how long this takes.
    fn establish(
        self,
    ) -> impl std::future::Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single message-framed connection that can send and receive bytes.
///
/// `send` and `recv` must be usable concurrently from different tasks:
/// the per-connection read loop sits in `recv` while other connections'
/// loops push frames through `send`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed, either by
    /// the peer or by a local [`close`](Self::close).
    fn recv(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. A pending `recv` returns `Ok(None)`.
    fn close(
        &self,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Address of the remote peer, if the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Local address the connection was accepted on, if any.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}
