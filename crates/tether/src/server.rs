//! `TetherServer` builder and accept loop.
//!
//! This is the entry point for running a Tether server over WebSockets. It
//! ties the layers together: transport → session hub → per-connection
//! handler.

use std::net::SocketAddr;
use std::sync::Arc;

use tether_session::{Authenticator, SessionConfig};
use tether_transport::{
    Incoming, Transport, WebSocketConnection, WebSocketTransport,
};
use tracing::{debug, error, info};

use crate::handler::serve_connection;
use crate::{SessionHub, TetherConfig, TetherError};

/// Builder for configuring and starting a Tether server.
///
/// # Example
///
/// ```rust,no_run
/// use tether::prelude::*;
///
/// # async fn demo() -> Result<(), TetherError> {
/// let server = TetherServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(AcceptAll)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TetherServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl TetherServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Takes the bind address and session settings from `config`.
    pub fn config(self, config: &TetherConfig) -> Self {
        self.bind(&config.bind)
            .session_config(config.session.clone())
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and starts the session hub.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<TetherServer<A>, TetherError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let hub = SessionHub::start(self.session_config);
        Ok(TetherServer {
            transport,
            hub,
            auth: Arc::new(auth),
        })
    }
}

impl Default for TetherServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tether server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TetherServer<A> {
    transport: WebSocketTransport,
    hub: Arc<SessionHub<WebSocketConnection>>,
    auth: Arc<A>,
}

impl<A: Authenticator> TetherServer<A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TetherError> {
        Ok(self.transport.local_addr()?)
    }

    /// The hub holding this server's sessions. Clone it to push messages
    /// or shut the server down from elsewhere.
    pub fn hub(&self) -> &Arc<SessionHub<WebSocketConnection>> {
        &self.hub
    }

    /// Runs the accept loop until the hub is shut down.
    ///
    /// Each accepted socket gets its own task, which runs the WebSocket
    /// upgrade and then serves the connection. The loop itself never waits
    /// on a client, so a socket that stalls mid-upgrade only costs its own
    /// task. A failed accept is logged and the loop carries on.
    pub async fn run(mut self) -> Result<(), TetherError> {
        info!(addr = ?self.transport.local_addr().ok(), "Tether server running");

        loop {
            let accepted = tokio::select! {
                _ = self.hub.stopped() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(incoming) => {
                    let hub = Arc::clone(&self.hub);
                    let auth = Arc::clone(&self.auth);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.establish().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                debug!(?peer, error = %e, "upgrade failed");
                                return;
                            }
                        };
                        if let Err(e) =
                            serve_connection(&hub, auth.as_ref(), conn).await
                        {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }

        info!("Tether server stopped");
        Ok(())
    }
}
