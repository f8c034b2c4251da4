//! In-process connections backed by Tokio channels.
//!
//! A [`MemoryConnection`] is the server side of a connection and a
//! [`MemoryPeer`] is the client end. They let the session and routing
//! layers run their full lifecycle without opening a socket, which is what
//! the crate tests (and anyone embedding Tether behind another transport)
//! use.

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, TransportError};

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: watch::Sender<bool>,
}

/// Client end of an in-memory connection.
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: watch::Receiver<bool>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let conn = MemoryConnection {
            id: ConnectionId::next(),
            inbound: Mutex::new(server_rx),
            outbound: server_tx,
            closed: closed_tx,
        };
        let peer = MemoryPeer {
            tx: client_tx,
            rx: client_rx,
            closed: closed_rx,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = closed.wait_for(|c| *c) => Ok(None),
            frame = inbound.recv() => Ok(frame),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let was_closed = self.closed.send_replace(true);
        if was_closed {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// Sends a frame to the server side.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.tx
            .send(data.into())
            .map_err(|_| TransportError::ConnectionClosed("peer".into()))
    }

    /// Receives the next frame the server wrote, or `None` once the
    /// server side is gone and every buffered frame has been read.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    /// Returns `true` once the server side has closed the connection.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Waits until the server side closes the connection.
    pub async fn closed(&mut self) {
        let _ = self.closed.wait_for(|c| *c).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_send_and_recv_both_directions() {
        let (conn, mut peer) = MemoryConnection::pair();

        peer.send("hello").unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(b"hello".to_vec()));

        conn.send(b"world").await.unwrap();
        assert_eq!(peer.recv().await, Some(b"world".to_vec()));
    }

    #[tokio::test]
    async fn test_close_wakes_pending_recv() {
        let (conn, mut peer) = MemoryConnection::pair();
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        conn.close().await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), None);
        peer.closed().await;
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (conn, _peer) = MemoryConnection::pair();
        conn.close().await.unwrap();

        let result = conn.send(b"late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_close_twice_reports_error() {
        let (conn, _peer) = MemoryConnection::pair();
        conn.close().await.unwrap();
        assert!(conn.close().await.is_err());
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_peer_dropped() {
        let (conn, peer) = MemoryConnection::pair();
        drop(peer);
        assert_eq!(conn.recv().await.unwrap(), None);
    }
}
