//! Unified error type for the bingo engine.

use bingo_allocator::AllocError;
use bingo_cards::{GenerationError, JobError};
use bingo_protocol::ProtocolError;
use bingo_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// Bad grid, or an event that failed to encode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Starting, polling, or cancelling a generation job.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A direct chunked generation run.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A refused join, selection, or timeout.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
