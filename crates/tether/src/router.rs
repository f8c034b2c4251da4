//! Identity-addressed delivery.
//!
//! A frame's first field names the identity it is for. The router looks
//! that identity up in the session registry and writes the frame, byte for
//! byte, to its connection. Nothing is queued: if nobody is logged in as
//! the recipient the frame is dropped, and the sender is never told.

use std::sync::Arc;

use tether_protocol::{Package, ProtocolError};
use tether_session::SessionRegistry;
use tether_transport::Connection;
use tracing::debug;

/// What happened to a routed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the recipient's connection.
    Delivered,
    /// Nobody is logged in as the recipient; the frame was dropped.
    NoRecipient,
    /// The recipient was found but the write failed.
    Failed,
}

/// Routes packages to the connection registered for their recipient.
pub struct Router<C> {
    registry: Arc<SessionRegistry<C>>,
}

impl<C: Connection> Router<C> {
    pub fn new(registry: Arc<SessionRegistry<C>>) -> Self {
        Self { registry }
    }

    /// Delivers `pkg` to the identity named by its router field.
    ///
    /// The registry lock is released before writing, so a slow recipient
    /// holds up only this delivery.
    pub async fn deliver(&self, pkg: &Package) -> Delivery {
        let Some(target) = self.registry.lookup(pkg.router()).await else {
            debug!(sender = pkg.sender(), router = pkg.router(), "no recipient, frame dropped");
            return Delivery::NoRecipient;
        };

        match target.send(pkg.raw()).await {
            Ok(()) => {
                debug!(
                    sender = pkg.sender(),
                    router = pkg.router(),
                    bytes = pkg.raw().len(),
                    "frame delivered"
                );
                Delivery::Delivered
            }
            Err(e) => {
                debug!(
                    sender = pkg.sender(),
                    router = pkg.router(),
                    error = %e,
                    "delivery failed"
                );
                Delivery::Failed
            }
        }
    }

    /// Builds a server push and delivers it.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if `router` or `correlation_id`
    /// contains the NUL separator.
    pub async fn send(
        &self,
        router: &str,
        correlation_id: &str,
        value: &str,
    ) -> Result<Delivery, ProtocolError> {
        let pkg = Package::push(router, correlation_id, value)?;
        Ok(self.deliver(&pkg).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_session::TrackedConnection;
    use tether_transport::{MemoryConnection, MemoryPeer};

    async fn registered(
        registry: &SessionRegistry<MemoryConnection>,
        identity: &str,
    ) -> MemoryPeer {
        let (conn, peer) = MemoryConnection::pair();
        let conn = Arc::new(TrackedConnection::new(conn));
        conn.begin_auth();
        conn.authenticate(identity);
        registry.register(identity, conn).await.unwrap();
        peer
    }

    fn router() -> (Router<MemoryConnection>, Arc<SessionRegistry<MemoryConnection>>) {
        let registry = Arc::new(SessionRegistry::new());
        (Router::new(Arc::clone(&registry)), registry)
    }

    // =====================================================================
    // deliver()
    // =====================================================================

    #[tokio::test]
    async fn test_deliver_writes_raw_frame_to_recipient() {
        let (router, registry) = router();
        let mut bob = registered(&registry, "bob").await;

        let raw = b"bob\x007\x00-\x00hello".to_vec();
        let pkg = Package::parse("alice", raw.clone());
        assert_eq!(router.deliver(&pkg).await, Delivery::Delivered);
        assert_eq!(bob.recv().await, Some(raw));
    }

    #[tokio::test]
    async fn test_deliver_unknown_recipient_is_dropped() {
        let (router, registry) = router();
        let mut alice = registered(&registry, "alice").await;

        let pkg = Package::parse("alice", b"carol\x001\x00-\x00hi".to_vec());
        assert_eq!(router.deliver(&pkg).await, Delivery::NoRecipient);
        assert!(alice.try_recv().is_none(), "sender is not told");
    }

    #[tokio::test]
    async fn test_deliver_write_failure_is_reported() {
        let (router, registry) = router();
        let bob = registered(&registry, "bob").await;
        drop(bob);

        let pkg = Package::parse("alice", b"bob\x001\x00-\x00hi".to_vec());
        assert_eq!(router.deliver(&pkg).await, Delivery::Failed);
    }

    #[tokio::test]
    async fn test_deliver_to_self_is_allowed() {
        let (router, registry) = router();
        let mut alice = registered(&registry, "alice").await;

        let pkg = Package::parse("alice", b"alice\x001\x00-\x00note".to_vec());
        assert_eq!(router.deliver(&pkg).await, Delivery::Delivered);
        assert!(alice.recv().await.is_some());
    }

    // =====================================================================
    // send()
    // =====================================================================

    #[tokio::test]
    async fn test_send_pushes_system_frame() {
        let (router, registry) = router();
        let mut bob = registered(&registry, "bob").await;

        let delivery = router.send("bob", "9", "ping").await.unwrap();
        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(bob.recv().await, Some(b"bob\x009\x00-\x00ping".to_vec()));
    }

    #[tokio::test]
    async fn test_send_invalid_router_is_error() {
        let (router, _registry) = router();
        let result = router.send("b\0b", "9", "ping").await;
        assert!(matches!(result, Err(ProtocolError::InvalidField { .. })));
    }
}
