//! The application frame.
//!
//! Once logged in, a client talks in frames of four NUL-separated fields:
//!
//! ```text
//! router \0 correlation-id \0 marker \0 value
//! ```
//!
//! `router` names the identity the frame is for. `correlation-id` and
//! `marker` are carried opaquely for the endpoints (the marker is `-` when
//! unused). The value is everything after the third separator, NULs
//! included.
//!
//! A [`Package`] pairs the parsed fields with the raw bytes, which are what
//! gets forwarded, and with the sender. The sender never comes from the
//! frame: it is the identity the connection logged in as, or
//! [`SYSTEM_SENDER`] for server pushes.

use crate::ProtocolError;

/// Field separator.
pub const SEPARATOR: u8 = 0;

/// Sender of frames the server pushes on its own behalf.
pub const SYSTEM_SENDER: &str = "@system";

/// Marker value for frames that don't use the field.
pub const UNUSED_MARKER: &str = "-";

/// Notice written to a connection just before it is evicted by a newer
/// login for the same identity.
pub const EVICTION_NOTICE: &[u8] = b"close";

/// A parsed frame plus who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    sender: String,
    router: String,
    correlation_id: String,
    marker: String,
    value: String,
    raw: Vec<u8>,
}

impl Package {
    /// Parses a frame received from `sender`.
    ///
    /// Never fails: fields missing from a short frame are left empty.
    pub fn parse(sender: impl Into<String>, raw: Vec<u8>) -> Self {
        let (router, correlation_id, marker, value) = {
            let mut fields = raw.splitn(4, |b| *b == SEPARATOR).map(lossy);
            (
                fields.next().unwrap_or_default(),
                fields.next().unwrap_or_default(),
                fields.next().unwrap_or_default(),
                fields.next().unwrap_or_default(),
            )
        };
        Self {
            sender: sender.into(),
            router,
            correlation_id,
            marker,
            value,
            raw,
        }
    }

    /// Builds a server push for `router`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if `router` or `correlation_id`
    /// contains the separator.
    pub fn push(
        router: &str,
        correlation_id: &str,
        value: &str,
    ) -> Result<Self, ProtocolError> {
        check_field("router", router)?;
        check_field("correlation id", correlation_id)?;

        let mut raw = Vec::with_capacity(
            router.len() + correlation_id.len() + value.len() + 4,
        );
        for (i, field) in [router, correlation_id, UNUSED_MARKER, value]
            .iter()
            .enumerate()
        {
            if i > 0 {
                raw.push(SEPARATOR);
            }
            raw.extend_from_slice(field.as_bytes());
        }

        Ok(Self {
            sender: SYSTEM_SENDER.to_string(),
            router: router.to_string(),
            correlation_id: correlation_id.to_string(),
            marker: UNUSED_MARKER.to_string(),
            value: value.to_string(),
            raw,
        })
    }

    /// Identity that produced the frame.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Identity the frame is addressed to.
    pub fn router(&self) -> &str {
        &self.router
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The frame exactly as received (or built), which is what gets
    /// delivered.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns `true` for frames pushed by the server itself.
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn check_field(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.as_bytes().contains(&SEPARATOR) {
        return Err(ProtocolError::InvalidField { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_frame_splits_four_fields() {
        let pkg = Package::parse("alice", b"bob\x0042\x00-\x00hello".to_vec());

        assert_eq!(pkg.sender(), "alice");
        assert_eq!(pkg.router(), "bob");
        assert_eq!(pkg.correlation_id(), "42");
        assert_eq!(pkg.marker(), "-");
        assert_eq!(pkg.value(), "hello");
        assert!(!pkg.is_system());
    }

    #[test]
    fn test_parse_short_frame_leaves_missing_fields_empty() {
        let pkg = Package::parse("alice", b"bob\x0042".to_vec());

        assert_eq!(pkg.router(), "bob");
        assert_eq!(pkg.correlation_id(), "42");
        assert_eq!(pkg.marker(), "");
        assert_eq!(pkg.value(), "");
    }

    #[test]
    fn test_parse_empty_frame_has_empty_router() {
        let pkg = Package::parse("alice", Vec::new());
        assert_eq!(pkg.router(), "");
        assert!(pkg.raw().is_empty());
    }

    #[test]
    fn test_parse_value_keeps_extra_separators() {
        let pkg = Package::parse("alice", b"bob\x001\x00-\x00a\x00b".to_vec());
        assert_eq!(pkg.value(), "a\0b");
    }

    #[test]
    fn test_parse_keeps_raw_bytes_untouched() {
        let raw = b"bob\x001\x00-\x00\xff\xfe".to_vec();
        let pkg = Package::parse("alice", raw.clone());
        assert_eq!(pkg.raw(), raw.as_slice());
        assert_eq!(pkg.value(), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_push_then_parse_gives_same_fields() {
        let pushed = Package::push("bob", "42", "hello").unwrap();
        assert!(pushed.is_system());
        assert_eq!(pushed.raw(), b"bob\x0042\x00-\x00hello");

        let parsed = Package::parse(SYSTEM_SENDER, pushed.raw().to_vec());
        assert_eq!(parsed, pushed);
        assert_eq!(parsed.marker(), UNUSED_MARKER);
    }

    #[test]
    fn test_push_rejects_separator_in_router() {
        let result = Package::push("b\0ob", "42", "hello");
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidField { field: "router" })
        ));
    }

    #[test]
    fn test_push_rejects_separator_in_correlation_id() {
        let result = Package::push("bob", "4\x002", "hello");
        assert!(matches!(result, Err(ProtocolError::InvalidField { .. })));
    }

    #[test]
    fn test_push_allows_separator_in_value() {
        let pkg = Package::push("bob", "1", "a\0b").unwrap();
        let parsed = Package::parse(SYSTEM_SENDER, pkg.raw().to_vec());
        assert_eq!(parsed.value(), "a\0b");
    }
}
