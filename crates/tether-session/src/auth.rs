//! Authentication gateway: asks someone else whether a login is valid.
//!
//! Tether doesn't store credentials. When a client sends
//! `login <identity> <secret>`, the pair is handed to an [`Authenticator`]
//! which answers with a [`Verdict`]: accepted or rejected, plus a message
//! that is written back to the client verbatim.
//!
//! Two authenticators ship with the crate:
//!
//! - [`AcceptAll`] for when no verifier is configured. Every login is
//!   accepted with the message `"accept "`.
//! - [`HttpAuthenticator`], which POSTs the credentials as a form
//!   (`name`, `pass`) to an external endpoint. The login is accepted if the
//!   response body starts with `"accept "`; any other body is the rejection
//!   message.
//!
//! [`AuthGateway`] picks between them from an optional endpoint, which is
//! what the server builds from its configuration. Any other type
//! implementing [`Authenticator`] works too (the tests use scripted ones).

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::SessionError;

/// Prefix of a response body that accepts a login.
pub const ACCEPT_PREFIX: &str = "accept ";

/// How long a single verifier request may take.
const VERIFIER_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The outcome of a login check. Both variants carry the message that is
/// sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept(String),
    Reject(String),
}

impl Verdict {
    /// Reads a verifier response body.
    ///
    /// Accepted iff the body starts with [`ACCEPT_PREFIX`]; the full body is
    /// kept as the message either way.
    pub fn from_body(body: String) -> Self {
        if body.starts_with(ACCEPT_PREFIX) {
            Self::Accept(body)
        } else {
            Self::Reject(body)
        }
    }

    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accept(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Accept(msg) | Self::Reject(msg) => msg,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            Self::Accept(msg) | Self::Reject(msg) => msg,
        }
    }
}

// ---------------------------------------------------------------------------
// Authenticator trait
// ---------------------------------------------------------------------------

/// Decides whether a login is valid.
///
/// Never fails: problems reaching a verifier are a rejection whose message
/// describes the problem.
///
/// ```rust
/// use tether_session::{Authenticator, Verdict};
///
/// /// Lets in anyone whose secret is their name spelled backwards.
/// struct Mirror;
///
/// impl Authenticator for Mirror {
///     async fn authenticate(&self, identity: &str, secret: &str) -> Verdict {
///         if identity.chars().rev().eq(secret.chars()) {
///             Verdict::Accept("accept welcome".into())
///         } else {
///             Verdict::Reject("no".into())
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `identity` / `secret`.
    fn authenticate(
        &self,
        identity: &str,
        secret: &str,
    ) -> impl Future<Output = Verdict> + Send;
}

// ---------------------------------------------------------------------------
// AcceptAll
// ---------------------------------------------------------------------------

/// Accepts every login. Used when no verifier is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Authenticator for AcceptAll {
    async fn authenticate(&self, _identity: &str, _secret: &str) -> Verdict {
        Verdict::Accept(ACCEPT_PREFIX.to_string())
    }
}

// ---------------------------------------------------------------------------
// HttpAuthenticator
// ---------------------------------------------------------------------------

/// Checks logins against an external HTTP verifier.
///
/// One form POST per login, no retries.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpAuthenticator {
    /// Creates an authenticator for `endpoint` with its own client.
    ///
    /// # Errors
    /// [`SessionError::InvalidEndpoint`] if `endpoint` isn't an absolute
    /// URL, [`SessionError::Client`] if the HTTP client can't be built.
    pub fn new(endpoint: &str) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(VERIFIER_TIMEOUT)
            .build()?;
        Self::with_client(client, endpoint)
    }

    /// Like [`new`](Self::new) but reuses an existing client.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
    ) -> Result<Self, SessionError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| {
            SessionError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn verify(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<String, reqwest::Error> {
        self.client
            .post(self.endpoint.clone())
            .form(&[("name", identity), ("pass", secret)])
            .send()
            .await?
            .text()
            .await
    }
}

impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, identity: &str, secret: &str) -> Verdict {
        match self.verify(identity, secret).await {
            Ok(body) => Verdict::from_body(body),
            Err(e) => {
                debug!(%identity, endpoint = %self.endpoint, error = %e, "verifier unreachable");
                Verdict::Reject(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AuthGateway
// ---------------------------------------------------------------------------

/// The authenticator the server uses: open when no verifier is configured,
/// HTTP otherwise.
#[derive(Debug, Clone)]
pub enum AuthGateway {
    Open(AcceptAll),
    Http(HttpAuthenticator),
}

impl AuthGateway {
    /// Builds the gateway for an optional verifier endpoint. Empty strings
    /// count as "not configured".
    pub fn from_endpoint(endpoint: Option<&str>) -> Result<Self, SessionError> {
        match endpoint.filter(|e| !e.is_empty()) {
            Some(endpoint) => Ok(Self::Http(HttpAuthenticator::new(endpoint)?)),
            None => Ok(Self::Open(AcceptAll)),
        }
    }

    /// Returns `true` if logins go to an external verifier.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl Authenticator for AuthGateway {
    async fn authenticate(&self, identity: &str, secret: &str) -> Verdict {
        match self {
            Self::Open(auth) => auth.authenticate(identity, secret).await,
            Self::Http(auth) => auth.authenticate(identity, secret).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_accept_prefix_is_accepted() {
        let verdict = Verdict::from_body("accept welcome".into());
        assert!(verdict.accepted());
        assert_eq!(verdict.message(), "accept welcome");
    }

    #[test]
    fn test_from_body_bare_accept_is_accepted() {
        assert!(Verdict::from_body("accept ".into()).accepted());
    }

    #[test]
    fn test_from_body_without_trailing_space_is_rejected() {
        let verdict = Verdict::from_body("accept".into());
        assert!(!verdict.accepted());
        assert_eq!(verdict.message(), "accept");
    }

    #[test]
    fn test_from_body_other_text_is_rejected_verbatim() {
        let verdict = Verdict::from_body("denied: bad password".into());
        assert_eq!(verdict, Verdict::Reject("denied: bad password".into()));
    }

    #[test]
    fn test_from_body_is_case_sensitive() {
        assert!(!Verdict::from_body("Accept yes".into()).accepted());
    }

    #[tokio::test]
    async fn test_accept_all_accepts_with_bare_prefix() {
        let verdict = AcceptAll.authenticate("anyone", "anything").await;
        assert_eq!(verdict, Verdict::Accept("accept ".into()));
    }

    #[test]
    fn test_gateway_without_endpoint_is_open() {
        assert!(!AuthGateway::from_endpoint(None).unwrap().is_verified());
        assert!(!AuthGateway::from_endpoint(Some("")).unwrap().is_verified());
    }

    #[test]
    fn test_gateway_with_endpoint_is_http() {
        let gateway =
            AuthGateway::from_endpoint(Some("http://127.0.0.1:9/verify"))
                .unwrap();
        assert!(gateway.is_verified());
    }

    #[test]
    fn test_http_authenticator_rejects_relative_endpoint() {
        let err = HttpAuthenticator::new("/verify").unwrap_err();
        assert!(matches!(err, SessionError::InvalidEndpoint { .. }));
    }
}
