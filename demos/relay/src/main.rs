//! A bare relay: clients log in and send each other frames.
//!
//! ```text
//! cargo run -p relay -- demos/relay/relay.toml
//! ```
//!
//! Without an argument the defaults are used (127.0.0.1:8080, every login
//! accepted). `RUST_LOG` controls verbosity.

use std::sync::Arc;
use std::time::Duration;

use tether::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How often the hub status is logged.
const STATUS_EVERY: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

fn load_config() -> Result<TetherConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => TetherConfig::from_file(path),
        None => Ok(TetherConfig::default()),
    }
}

async fn build(config: &TetherConfig) -> Result<TetherServer<AuthGateway>, TetherError> {
    let gateway = config.gateway()?;
    info!(verified = gateway.is_verified(), "login gateway ready");
    TetherServerBuilder::new().config(config).build(gateway).await
}

/// Logs the hub status as JSON until the hub stops.
async fn report_status(hub: Arc<SessionHub<WebSocketConnection>>) {
    let mut ticker = tokio::time::interval(STATUS_EVERY);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = hub.stopped() => break,
            _ = ticker.tick() => {}
        }
        match serde_json::to_string(&hub.status().await) {
            Ok(status) => info!(%status, "hub status"),
            Err(e) => error!(error = %e, "status not serializable"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let server = build(&config).await?;
    info!(addr = %server.local_addr()?, "relay listening");

    let hub = Arc::clone(server.hub());
    tokio::spawn(report_status(Arc::clone(&hub)));
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, shutting down");
        hub.shutdown().await;
    });

    server.run().await?;
    Ok(())
}
