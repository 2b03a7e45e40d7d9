//! Storage traits.
//!
//! Methods return `impl Future + Send` so implementations can simply write
//! `async fn`, and callers can hold the future across a `tokio::spawn`.

use std::future::Future;

use bingo_protocol::{
    BunchCard, BunchId, CardBunch, CardId, GridSpec, NewBunchCard,
    NewRoundPlayer, PlayerId, RoundConfig, RoundId, RoundPlayer,
};

use crate::StoreError;

/// Bunch metadata and the cards generated for each bunch.
pub trait CardPoolStore: Send + Sync + 'static {
    /// Creates bunch metadata with `card_count` 0.
    fn create_bunch(
        &self,
        name: &str,
        grid: GridSpec,
    ) -> impl Future<Output = Result<CardBunch, StoreError>> + Send;

    fn get_bunch(
        &self,
        id: BunchId,
    ) -> impl Future<Output = Result<Option<CardBunch>, StoreError>> + Send;

    /// All bunches, newest first.
    fn list_bunches(
        &self,
    ) -> impl Future<Output = Result<Vec<CardBunch>, StoreError>> + Send;

    /// Bunches whose cards fit a round's grid, sorted by name.
    fn find_bunches_by_dimensions(
        &self,
        grid: GridSpec,
    ) -> impl Future<Output = Result<Vec<CardBunch>, StoreError>> + Send;

    /// Deletes a bunch together with all its cards.
    ///
    /// Returns `false` if the bunch did not exist.
    fn delete_bunch(
        &self,
        id: BunchId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Persists one batch of cards.
    ///
    /// The batch is all-or-nothing: either every card is stored and the
    /// owning bunch's `card_count` grows by the batch size, or nothing
    /// changes. Returns the number of cards written.
    ///
    /// # Errors
    /// [`StoreError::BunchNotFound`] if a card references a missing bunch,
    /// [`StoreError::DuplicateCardIndex`] if an index is already taken.
    fn insert_cards(
        &self,
        cards: Vec<NewBunchCard>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Every card id in the bunch, ordered by index.
    fn card_ids(
        &self,
        bunch_id: BunchId,
    ) -> impl Future<Output = Result<Vec<CardId>, StoreError>> + Send;

    /// Loads cards by id, in the order requested. Unknown ids are skipped.
    fn cards_by_ids(
        &self,
        ids: &[CardId],
    ) -> impl Future<Output = Result<Vec<BunchCard>, StoreError>> + Send;

    /// A page of the bunch's cards, ordered by index.
    fn cards_page(
        &self,
        bunch_id: BunchId,
        skip: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<BunchCard>, StoreError>> + Send;

    fn count_cards(
        &self,
        bunch_id: BunchId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Deletes every card of a bunch but keeps the metadata.
    ///
    /// Returns the number of cards removed.
    fn purge_cards(
        &self,
        bunch_id: BunchId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Per-round player allocation records.
///
/// Only the allocator writes through this trait, and it does so from one
/// task per round.
pub trait PlayerStore: Send + Sync + 'static {
    /// Creates a player in `Selecting` with the given locked cards.
    ///
    /// Codes are stored upper-case.
    ///
    /// # Errors
    /// [`StoreError::DuplicatePlayerCode`] if the code is taken in this
    /// round.
    fn insert_player(
        &self,
        player: NewRoundPlayer,
    ) -> impl Future<Output = Result<RoundPlayer, StoreError>> + Send;

    fn get_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<RoundPlayer>, StoreError>> + Send;

    /// Looks a player up by code, case-insensitively.
    fn player_by_code(
        &self,
        round_id: RoundId,
        code: &str,
    ) -> impl Future<Output = Result<Option<RoundPlayer>, StoreError>> + Send;

    /// All players of a round, in join order.
    fn players_in_round(
        &self,
        round_id: RoundId,
    ) -> impl Future<Output = Result<Vec<RoundPlayer>, StoreError>> + Send;

    fn count_players(
        &self,
        round_id: RoundId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Sets `selected_card_ids`, clears `locked_card_ids`, and marks the
    /// player ready, in one write.
    ///
    /// # Errors
    /// [`StoreError::PlayerNotFound`] if the record is gone.
    fn save_selection(
        &self,
        id: PlayerId,
        selected: Vec<CardId>,
    ) -> impl Future<Output = Result<RoundPlayer, StoreError>> + Send;

    /// Round teardown: removes every player of the round.
    fn delete_round_players(
        &self,
        round_id: RoundId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Read-only access to round configuration.
///
/// Rounds are created, started, and ended elsewhere. The allocator only
/// needs to know whether a round takes joins and how it deals cards.
pub trait RoundProvider: Send + Sync + 'static {
    fn get_round(
        &self,
        round_id: RoundId,
    ) -> impl Future<Output = Result<Option<RoundConfig>, StoreError>> + Send;
}
