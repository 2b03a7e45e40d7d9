//! Error types for card generation.

use bingo_protocol::{JobId, ProtocolError};
use bingo_store::StoreError;

/// Why a chunked generation run stopped early.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Grid size and number range can't produce a card.
    #[error(transparent)]
    Grid(#[from] ProtocolError),

    /// The cancel flag was seen at a chunk boundary. Cards written before
    /// that boundary stay in the store.
    #[error("generation cancelled after {generated} cards")]
    Cancelled { generated: u64 },

    /// A chunk write failed. Earlier chunks stay in the store.
    #[error("chunk write failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors from host-side job control.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job with this id (never created, or already cleaned up).
    #[error("generation job {0} not found")]
    NotFound(JobId),

    /// The request is missing a name or asks for zero cards.
    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    /// Grid size and number range can't produce a card.
    #[error(transparent)]
    Grid(#[from] ProtocolError),

    /// Creating the bunch metadata failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
