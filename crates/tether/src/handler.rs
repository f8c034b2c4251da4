//! Per-connection handler: login, then routing.
//!
//! Each accepted connection gets its own Tokio task running
//! [`serve_connection`]. The flow is:
//!
//!   1. Track the connection in the ledger (state `New`). A hub that has
//!      shut down refuses it and the socket is closed straight away
//!   2. Read the first frame and tokenize it as a login command
//!      (`AuthPending`)
//!   3. Ask the authenticator; on acceptance register the identity,
//!      evicting any older connection, and echo the verifier's message
//!      (`Authenticated`)
//!   4. Loop: every frame becomes a [`Package`] sent by this identity and
//!      is handed to the router
//!   5. On read error or close: unregister, close the socket (`Closed`)
//!
//! A first frame that isn't a login, or a rejected login, ends the task
//! with the connection `Closed` but its socket still open. The reaper
//! closes it once the grace window is up. However the task ends, the
//! reaper is woken on the way out.

use std::sync::Arc;

use tether_protocol::{tokenize, Login, Package};
use tether_session::{Authenticator, TrackedConnection};
use tether_sweep::SweepWaker;
use tether_transport::Connection;
use tracing::{debug, info};

use crate::{SessionHub, TetherError};

/// Wakes the reaper when the connection task exits, whichever way it
/// exits.
struct ReapOnExit {
    waker: SweepWaker,
}

impl Drop for ReapOnExit {
    fn drop(&mut self) {
        self.waker.wake();
    }
}

/// Drives one connection from accept to close.
///
/// Errors are scoped to this connection: the caller only logs them.
pub async fn serve_connection<C, A>(
    hub: &SessionHub<C>,
    auth: &A,
    conn: C,
) -> Result<(), TetherError>
where
    C: Connection,
    A: Authenticator,
{
    // The ledger refuses (and closes) connections once the hub has shut.
    let Some(tracked) = hub.ledger().track(conn).await else {
        return Ok(());
    };
    let _reap = ReapOnExit {
        waker: hub.reaper_waker(),
    };

    let result = match login(hub, auth, &tracked).await {
        Ok(Some(greeting)) => run_session(hub, &tracked, greeting).await,
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    tracked.mark_closed();
    result
}

/// Reads and checks the login frame.
///
/// Returns the message to greet the client with if the login was accepted
/// and the connection is now registered, `None` if it was not.
async fn login<C, A>(
    hub: &SessionHub<C>,
    auth: &A,
    tracked: &Arc<TrackedConnection<C>>,
) -> Result<Option<String>, TetherError>
where
    C: Connection,
    A: Authenticator,
{
    let conn_id = tracked.id();

    let Some(frame) = tracked.recv().await? else {
        debug!(%conn_id, "closed before login");
        return Ok(None);
    };
    tracked.begin_auth();

    let limit = hub.config().login_frame_limit;
    let head = &frame[..frame.len().min(limit)];
    let tokens = tokenize(&String::from_utf8_lossy(head));

    let Some(Login { identity, secret }) = Login::from_tokens(&tokens) else {
        debug!(%conn_id, tokens = tokens.len(), "first frame is not a login");
        return Ok(None);
    };

    let verdict = auth.authenticate(&identity, &secret).await;
    if !verdict.accepted() {
        info!(%conn_id, %identity, "login rejected");
        tracked.mark_closed();
        tracked.send(verdict.message().as_bytes()).await?;
        return Ok(None);
    }

    if !tracked.authenticate(&identity) {
        debug!(%conn_id, %identity, "connection closed during login");
        return Ok(None);
    }
    hub.registry()
        .register(&identity, Arc::clone(tracked))
        .await?;

    info!(%conn_id, %identity, "login accepted");
    Ok(Some(verdict.into_message()))
}

/// Greets the client and routes its frames until the connection ends, then
/// unregisters it.
async fn run_session<C: Connection>(
    hub: &SessionHub<C>,
    tracked: &TrackedConnection<C>,
    greeting: String,
) -> Result<(), TetherError> {
    // Only reached after a successful `authenticate`.
    let identity = tracked.identity().unwrap_or_default();
    let conn_id = tracked.id();

    let result = route_frames(hub, tracked, identity, greeting).await;

    hub.registry().remove(identity, conn_id).await;
    tracked.mark_closed();
    if let Err(e) = tracked.close().await {
        debug!(%conn_id, %identity, error = %e, "close failed");
    }
    info!(%conn_id, %identity, "session ended");
    result
}

async fn route_frames<C: Connection>(
    hub: &SessionHub<C>,
    tracked: &TrackedConnection<C>,
    identity: &str,
    greeting: String,
) -> Result<(), TetherError> {
    tracked.send(greeting.as_bytes()).await?;

    while let Some(frame) = tracked.recv().await? {
        let pkg = Package::parse(identity, frame);
        hub.router().deliver(&pkg).await;
    }
    Ok(())
}
