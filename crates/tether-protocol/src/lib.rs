//! Text and wire formats for Tether.
//!
//! - **Command tokenizer** ([`tokenize`], [`tokenize_block`],
//!   [`render_block`]): splits control commands and attribute lines into
//!   tokens, honoring quotes and backslash escapes.
//! - **Attribute block** ([`AttributeBlock`]): the project settings store
//!   the server reads its verifier endpoint from.
//! - **Package** ([`Package`]): the NUL-separated application frame.
//!
//! Nothing here touches a socket; the session layer feeds bytes in and
//! writes bytes out.
//!
//! ```text
//! Transport (bytes) → Protocol (tokens, Package) → Session (identity, routing)
//! ```

mod attributes;
mod command;
mod error;
mod package;

pub use attributes::AttributeBlock;
pub use command::{render_block, tokenize, tokenize_block, Login, LOGIN_COMMAND};
pub use error::ProtocolError;
pub use package::{
    Package, EVICTION_NOTICE, SEPARATOR, SYSTEM_SENDER, UNUSED_MARKER,
};
