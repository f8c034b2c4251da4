//! Error types for the session layer.

use tether_transport::ConnectionId;

/// Errors that can occur during session management.
///
/// Verifier *rejections* are not errors: they come back as a
/// [`Verdict::Reject`](crate::Verdict::Reject) so the message can be
/// relayed to the client. These variants cover setup problems and
/// registry refusals.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The verifier endpoint is not a usable URL.
    #[error("invalid verifier endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client for the verifier could not be built.
    #[error("verifier client: {0}")]
    Client(#[from] reqwest::Error),

    /// The connection's socket was closed before it could be registered
    /// (typically reaped while its login was being verified).
    #[error("{0} is already closed")]
    ConnectionClosed(ConnectionId),
}
