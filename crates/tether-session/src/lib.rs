//! Session management for Tether.
//!
//! This crate holds everything the server knows about its connections:
//!
//! 1. **Authentication**: asking a verifier whether a login is valid
//!    ([`Authenticator`], [`AuthGateway`])
//! 2. **Sessions**: which identity is on which connection, one connection
//!    per identity ([`SessionRegistry`])
//! 3. **Tracking and reaping**: every accepted socket, and closing the ones
//!    that don't log in within the grace window ([`ConnectionLedger`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← drives each connection through login and routing
//!     ↕
//! Session Layer (this crate)  ← identity, lifecycle state, reaping
//!     ↕
//! Transport + Protocol (below)  ← sockets, tokenizer, frames
//! ```

mod auth;
mod config;
mod connection;
mod error;
mod ledger;
mod registry;

pub use auth::{
    ACCEPT_PREFIX, AcceptAll, AuthGateway, Authenticator, HttpAuthenticator,
    Verdict,
};
pub use config::SessionConfig;
pub use connection::{ConnectionInfo, LifecycleState, TrackedConnection};
pub use error::SessionError;
pub use ledger::ConnectionLedger;
pub use registry::{EVICTION_TIMEOUT, SessionRegistry};
