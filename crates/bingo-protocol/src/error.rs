//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means the data itself is malformed: bytes that
//! won't decode, or a grid shape that can't exist.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A grid size / number range combination that can't produce a card,
    /// or a cell layout that isn't a square grid.
    ///
    /// This is a caller precondition. It is reported immediately and never
    /// retried.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}
