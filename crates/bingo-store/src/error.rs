//! Error types for the store layer.

use bingo_protocol::{BunchId, PlayerId, RoundId};

/// Errors that can occur while reading or writing the card pool.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bunch does not exist (never created, or deleted).
    #[error("card bunch {0} not found")]
    BunchNotFound(BunchId),

    /// The player record does not exist.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// Another player in the round already uses this code.
    #[error("player code {code} already used in round {round_id}")]
    DuplicatePlayerCode { round_id: RoundId, code: String },

    /// A card with this index already exists in the bunch.
    #[error("card index {index} already exists in bunch {bunch_id}")]
    DuplicateCardIndex { bunch_id: BunchId, index: u64 },

    /// The backing database failed.
    #[error("store backend error: {0}")]
    Backend(String),
}
