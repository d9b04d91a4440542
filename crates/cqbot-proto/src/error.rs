//! Error types for the protocol library.
//!
//! Covers decoding failures of gateway payloads and malformed
//! declarations handed to the grammar.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload was not valid JSON or did not match the event model.
    #[cfg(feature = "serde")]
    #[error("failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),

    /// A field the event kind requires was absent.
    #[error("missing field `{0}` in {1} event")]
    MissingField(&'static str, &'static str),

    /// An option declaration contained no usable name.
    #[error("option declaration `{0}` has no name")]
    EmptyOption(String),
}
