//! Error types for card allocation.

use bingo_protocol::{CardId, PlayerId, RoundId};
use bingo_store::StoreError;

/// Why a join, selection, or timeout was refused.
///
/// Every variant is scoped to one call. Nothing here is retried
/// internally; contention errors ([`InsufficientCards`](Self::InsufficientCards),
/// [`CodeGenerationExhausted`](Self::CodeGenerationExhausted)) may succeed
/// if the caller tries again later.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("round {0} not found")]
    RoundNotFound(RoundId),

    /// The round is not in progress, or has no bunch or delivery settings.
    #[error("round {0} is not accepting players")]
    RoundNotJoinable(RoundId),

    #[error("no unused player code in round {round_id} after {attempts} attempts")]
    CodeGenerationExhausted { round_id: RoundId, attempts: usize },

    #[error("not enough free cards: {available} available, {required} required")]
    InsufficientCards { available: usize, required: usize },

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("player {0} already has cards")]
    AlreadySelected(PlayerId),

    #[error("selection deadline passed for player {0}")]
    DeadlineExpired(PlayerId),

    /// A chosen card was not in the player's locked offer, or was chosen
    /// twice.
    #[error("card {card_id} is not a valid choice for player {player_id}")]
    InvalidSelection { player_id: PlayerId, card_id: CardId },

    #[error("expected {expected} cards, got {got}")]
    WrongSelectionCount { expected: usize, got: usize },

    /// The round's actor is gone or its channel is closed.
    #[error("round {0} is unavailable")]
    Unavailable(RoundId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
