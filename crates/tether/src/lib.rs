//! # Tether
//!
//! Live WebSocket sessions with identity-addressed message routing.
//!
//! Clients connect, log in with `login <identity> <secret>` (checked by an
//! external verifier, or by nobody), and from then on exchange frames of
//! the form `router \0 correlation-id \0 marker \0 value`, where `router`
//! is the identity the frame should be delivered to. Each identity has at
//! most one live connection; a second login evicts the first. Connections
//! that never log in are reaped after a short grace window.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn demo() -> Result<(), TetherError> {
//! let config = TetherConfig::default();
//! let server = TetherServerBuilder::new()
//!     .config(&config)
//!     .build(config.gateway()?)
//!     .await?;
//!
//! // Push to a logged-in identity from anywhere that holds the hub.
//! let hub = std::sync::Arc::clone(server.hub());
//! tokio::spawn(async move {
//!     let _ = hub.send("alice", "1", "hello from the server").await;
//! });
//!
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod router;
mod server;

pub use config::{verifier_from_attributes, TetherConfig, VERIFIER_ATTRIBUTE};
pub use error::{ConfigError, TetherError};
pub use handler::serve_connection;
pub use hub::{HubStatus, ReaperStatus, SessionHub};
pub use router::{Delivery, Router};
pub use server::{TetherServer, TetherServerBuilder};

/// Re-exports of the lower layers.
pub use tether_protocol as protocol;
pub use tether_session as session;
pub use tether_sweep as sweep;
pub use tether_transport as transport;

/// Everything needed to run a server or embed the hub.
pub mod prelude {
    pub use crate::{
        serve_connection, ConfigError, Delivery, HubStatus, SessionHub,
        TetherConfig, TetherError, TetherServer, TetherServerBuilder,
    };
    pub use tether_protocol::{Package, EVICTION_NOTICE, SYSTEM_SENDER};
    pub use tether_session::{
        AcceptAll, AuthGateway, Authenticator, ConnectionInfo,
        HttpAuthenticator, LifecycleState, SessionConfig, Verdict,
    };
    pub use tether_transport::{
        Connection, ConnectionId, MemoryConnection, MemoryPeer,
        WebSocketConnection,
    };
}
