//! Unified error type for Tether.

use std::path::PathBuf;

use tether_protocol::ProtocolError;
use tether_session::SessionError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tether` meta-crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be built.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (verifier setup, registration refused).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors loading a [`TetherConfig`](crate::TetherConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML was malformed or had the wrong shape.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_transport::ConnectionId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Transport(_)));
        assert!(tether_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidField { field: "router" };
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::ConnectionClosed(ConnectionId::new(3));
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Session(_)));
        assert!(tether_err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Io {
            path: PathBuf::from("/missing.toml"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Config(_)));
        assert!(tether_err.to_string().contains("/missing.toml"));
    }
}
