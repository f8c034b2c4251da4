//! Server configuration, loaded from TOML.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! verifier = "http://127.0.0.1:9000/verify"
//!
//! [session]
//! auth_grace = "5s"
//! sweep_interval = "5s"
//! login_frame_limit = 256
//! ```
//!
//! Instead of `verifier`, `attributes` may point at a project attribute
//! file; the last `ws_accept*` line in it names the verifier. Leaving both
//! out accepts every login.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tether_protocol::AttributeBlock;
use tether_session::{AuthGateway, SessionConfig};

use crate::{ConfigError, TetherError};

/// Attribute name prefix that names the verifier endpoint.
pub const VERIFIER_ATTRIBUTE: &str = "ws_accept";

/// Top-level configuration for a Tether server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Address the WebSocket endpoint listens on.
    pub bind: String,
    /// Verifier endpoint. Takes precedence over `attributes`.
    pub verifier: Option<String>,
    /// Project attribute file to read the verifier endpoint from.
    pub attributes: Option<PathBuf>,
    pub session: SessionConfig,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            verifier: None,
            attributes: None,
            session: SessionConfig::default(),
        }
    }
}

impl TetherConfig {
    /// Reads a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read(path)?;
        Self::from_toml_str(&text)
    }

    /// Parses TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The verifier endpoint to use, if any.
    ///
    /// `verifier` wins when set; otherwise the attribute file (if
    /// configured) is read and its last `ws_accept*` line used.
    pub fn verifier_endpoint(&self) -> Result<Option<String>, ConfigError> {
        if let Some(endpoint) = &self.verifier {
            return Ok(Some(endpoint.clone()));
        }
        match &self.attributes {
            Some(path) => {
                let block = AttributeBlock::parse(&read(path)?);
                Ok(verifier_from_attributes(&block))
            }
            None => Ok(None),
        }
    }

    /// Builds the authentication gateway this config describes.
    pub fn gateway(&self) -> Result<AuthGateway, TetherError> {
        let endpoint = self.verifier_endpoint()?;
        Ok(AuthGateway::from_endpoint(endpoint.as_deref())?)
    }
}

/// First argument of the last `ws_accept*` line that has one.
pub fn verifier_from_attributes(block: &AttributeBlock) -> Option<String> {
    block
        .get_like(VERIFIER_ATTRIBUTE)
        .into_iter()
        .filter_map(|args| args.first())
        .last()
        .cloned()
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("tether-config-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    // =====================================================================
    // Parsing
    // =====================================================================

    #[test]
    fn test_from_toml_str_empty_gives_defaults() {
        let cfg = TetherConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, TetherConfig::default());
        assert_eq!(cfg.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_from_toml_str_reads_session_table() {
        let cfg = TetherConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9001"

            [session]
            auth_grace = "2s"
            login_frame_limit = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9001");
        assert_eq!(cfg.session.auth_grace, Duration::from_secs(2));
        assert_eq!(cfg.session.sweep_interval, Duration::from_secs(5));
        assert_eq!(cfg.session.login_frame_limit, 64);
    }

    #[test]
    fn test_from_toml_str_bad_duration_is_parse_error() {
        let err = TetherConfig::from_toml_str("[session]\nauth_grace = \"soon\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let err = TetherConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let path = temp_file("from-file.toml", "verifier = \"http://v/check\"");
        let cfg = TetherConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.verifier.as_deref(), Some("http://v/check"));
    }

    // =====================================================================
    // verifier_endpoint()
    // =====================================================================

    #[test]
    fn test_verifier_endpoint_none_when_unconfigured() {
        let cfg = TetherConfig::default();
        assert_eq!(cfg.verifier_endpoint().unwrap(), None);
        assert!(!cfg.gateway().unwrap().is_verified());
    }

    #[test]
    fn test_verifier_endpoint_explicit_wins_over_attributes() {
        let cfg = TetherConfig {
            verifier: Some("http://explicit/verify".into()),
            attributes: Some(PathBuf::from("/not/read.jus")),
            ..TetherConfig::default()
        };
        assert_eq!(
            cfg.verifier_endpoint().unwrap().as_deref(),
            Some("http://explicit/verify")
        );
    }

    #[test]
    fn test_verifier_endpoint_reads_attribute_file() {
        let path = temp_file(
            "attrs.jus",
            "release-path /srv/out\r\nws_accept http://a/verify\r\nws_accept_2 http://b/verify",
        );
        let cfg = TetherConfig {
            attributes: Some(path.clone()),
            ..TetherConfig::default()
        };
        let endpoint = cfg.verifier_endpoint();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(endpoint.unwrap().as_deref(), Some("http://b/verify"));
    }

    #[test]
    fn test_verifier_endpoint_missing_attribute_file_is_error() {
        let cfg = TetherConfig {
            attributes: Some(PathBuf::from("/definitely/not/here.jus")),
            ..TetherConfig::default()
        };
        assert!(cfg.verifier_endpoint().is_err());
    }

    #[test]
    fn test_verifier_from_attributes_skips_lines_without_argument() {
        let block = AttributeBlock::parse("ws_accept http://a/verify\r\nws_accept");
        assert_eq!(
            verifier_from_attributes(&block).as_deref(),
            Some("http://a/verify")
        );
    }

    #[test]
    fn test_verifier_from_attributes_none_without_lines() {
        let block = AttributeBlock::parse("pattern /api http://backend");
        assert_eq!(verifier_from_attributes(&block), None);
    }
}
