//! Error types for the protocol layer.
//!
//! Parsing in this crate is total: the tokenizer and the frame parser
//! accept any input. Errors only arise when *building* a frame from parts
//! that would not survive the round trip.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame field contains the NUL separator and would split the frame.
    #[error("invalid {field} field: contains the NUL separator")]
    InvalidField {
        /// Which field was rejected.
        field: &'static str,
    },
}
