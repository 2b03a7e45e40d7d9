//! In-process implementation of [`CardPoolStore`] and [`PlayerStore`].
//!
//! All state sits behind one `parking_lot::Mutex`. No method holds the
//! lock across an `.await`, so every call is a single critical section:
//! a batch insert, a cascade delete, or a selection update is atomic with
//! respect to every other call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bingo_protocol::{
    BunchCard, BunchId, CardBunch, CardId, Clock, GridSpec, NewBunchCard,
    NewRoundPlayer, PlayerId, PlayerStatus, RoundId, RoundPlayer, SystemClock,
};
use parking_lot::Mutex;

use crate::{CardPoolStore, PlayerStore, StoreError};

#[derive(Default)]
struct Inner {
    next_bunch: u64,
    next_card: u64,
    next_player: u64,

    bunches: HashMap<BunchId, CardBunch>,
    cards: HashMap<CardId, BunchCard>,
    /// `(bunch, index) → card`. Ordered, so a range scan yields a bunch's
    /// cards by index.
    card_index: BTreeMap<(BunchId, u64), CardId>,

    players: HashMap<PlayerId, RoundPlayer>,
    /// Unique `(round, CODE)` constraint.
    player_codes: HashMap<(RoundId, String), PlayerId>,
    /// Player ids per round, in join order.
    round_players: HashMap<RoundId, Vec<PlayerId>>,
}

impl Inner {
    fn bunch_card_ids(&self, bunch_id: BunchId) -> impl Iterator<Item = CardId> + '_ {
        self.card_index
            .range((bunch_id, 0)..=(bunch_id, u64::MAX))
            .map(|(_, id)| *id)
    }

    fn remove_cards(&mut self, bunch_id: BunchId) -> u64 {
        let keys: Vec<(BunchId, u64)> = self
            .card_index
            .range((bunch_id, 0)..=(bunch_id, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            if let Some(card_id) = self.card_index.remove(key) {
                self.cards.remove(&card_id);
            }
        }
        keys.len() as u64
    }
}

/// A complete card pool and player store held in memory.
///
/// Cheap to share: wrap it in an `Arc` and hand clones to the generation
/// jobs and the allocator.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates an empty store stamping records with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping records with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CardPoolStore for MemoryStore {
    async fn create_bunch(
        &self,
        name: &str,
        grid: GridSpec,
    ) -> Result<CardBunch, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_bunch += 1;
        let bunch = CardBunch {
            id: BunchId(inner.next_bunch),
            name: name.to_string(),
            grid,
            card_count: 0,
            created_at: self.clock.now_ms(),
        };
        inner.bunches.insert(bunch.id, bunch.clone());
        tracing::debug!(bunch_id = %bunch.id, name, "bunch created");
        Ok(bunch)
    }

    async fn get_bunch(
        &self,
        id: BunchId,
    ) -> Result<Option<CardBunch>, StoreError> {
        Ok(self.inner.lock().bunches.get(&id).cloned())
    }

    async fn list_bunches(&self) -> Result<Vec<CardBunch>, StoreError> {
        let mut bunches: Vec<CardBunch> =
            self.inner.lock().bunches.values().cloned().collect();
        bunches.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        });
        Ok(bunches)
    }

    async fn find_bunches_by_dimensions(
        &self,
        grid: GridSpec,
    ) -> Result<Vec<CardBunch>, StoreError> {
        let mut bunches: Vec<CardBunch> = self
            .inner
            .lock()
            .bunches
            .values()
            .filter(|b| b.grid == grid)
            .cloned()
            .collect();
        bunches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(bunches)
    }

    async fn delete_bunch(&self, id: BunchId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if inner.bunches.remove(&id).is_none() {
            return Ok(false);
        }
        let removed = inner.remove_cards(id);
        tracing::info!(bunch_id = %id, cards = removed, "bunch deleted");
        Ok(true)
    }

    async fn insert_cards(
        &self,
        cards: Vec<NewBunchCard>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();

        // Validate the whole batch before touching anything.
        let mut batch_keys = std::collections::HashSet::with_capacity(cards.len());
        for card in &cards {
            if !inner.bunches.contains_key(&card.bunch_id) {
                return Err(StoreError::BunchNotFound(card.bunch_id));
            }
            let key = (card.bunch_id, card.index);
            if inner.card_index.contains_key(&key) || !batch_keys.insert(key) {
                return Err(StoreError::DuplicateCardIndex {
                    bunch_id: card.bunch_id,
                    index: card.index,
                });
            }
        }

        let written = cards.len();
        for card in cards {
            inner.next_card += 1;
            let id = CardId(inner.next_card);
            inner.card_index.insert((card.bunch_id, card.index), id);
            if let Some(bunch) = inner.bunches.get_mut(&card.bunch_id) {
                bunch.card_count += 1;
            }
            inner.cards.insert(
                id,
                BunchCard {
                    id,
                    bunch_id: card.bunch_id,
                    index: card.index,
                    grid: card.grid,
                },
            );
        }
        Ok(written)
    }

    async fn card_ids(&self, bunch_id: BunchId) -> Result<Vec<CardId>, StoreError> {
        Ok(self.inner.lock().bunch_card_ids(bunch_id).collect())
    }

    async fn cards_by_ids(
        &self,
        ids: &[CardId],
    ) -> Result<Vec<BunchCard>, StoreError> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.cards.get(id).cloned())
            .collect())
    }

    async fn cards_page(
        &self,
        bunch_id: BunchId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<BunchCard>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .bunch_card_ids(bunch_id)
            .skip(skip)
            .take(limit)
            .filter_map(|id| inner.cards.get(&id).cloned())
            .collect())
    }

    async fn count_cards(&self, bunch_id: BunchId) -> Result<u64, StoreError> {
        Ok(self.inner.lock().bunch_card_ids(bunch_id).count() as u64)
    }

    async fn purge_cards(&self, bunch_id: BunchId) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let removed = inner.remove_cards(bunch_id);
        if let Some(bunch) = inner.bunches.get_mut(&bunch_id) {
            bunch.card_count = 0;
        }
        tracing::info!(%bunch_id, cards = removed, "bunch cards purged");
        Ok(removed)
    }
}

impl PlayerStore for MemoryStore {
    async fn insert_player(
        &self,
        player: NewRoundPlayer,
    ) -> Result<RoundPlayer, StoreError> {
        let code = player.player_code.to_uppercase();
        let mut inner = self.inner.lock();

        let key = (player.round_id, code.clone());
        if inner.player_codes.contains_key(&key) {
            return Err(StoreError::DuplicatePlayerCode {
                round_id: player.round_id,
                code,
            });
        }

        inner.next_player += 1;
        let record = RoundPlayer {
            id: PlayerId(inner.next_player),
            round_id: player.round_id,
            player_code: code,
            status: PlayerStatus::Selecting,
            locked_card_ids: player.locked_card_ids,
            selected_card_ids: Vec::new(),
            selection_deadline: player.selection_deadline,
            joined_at: player.joined_at,
        };
        inner.player_codes.insert(key, record.id);
        inner
            .round_players
            .entry(record.round_id)
            .or_default()
            .push(record.id);
        inner.players.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_player(
        &self,
        id: PlayerId,
    ) -> Result<Option<RoundPlayer>, StoreError> {
        Ok(self.inner.lock().players.get(&id).cloned())
    }

    async fn player_by_code(
        &self,
        round_id: RoundId,
        code: &str,
    ) -> Result<Option<RoundPlayer>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .player_codes
            .get(&(round_id, code.to_uppercase()))
            .and_then(|id| inner.players.get(id))
            .cloned())
    }

    async fn players_in_round(
        &self,
        round_id: RoundId,
    ) -> Result<Vec<RoundPlayer>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .round_players
            .get(&round_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.players.get(id).cloned())
            .collect())
    }

    async fn count_players(&self, round_id: RoundId) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .lock()
            .round_players
            .get(&round_id)
            .map_or(0, Vec::len))
    }

    async fn save_selection(
        &self,
        id: PlayerId,
        selected: Vec<CardId>,
    ) -> Result<RoundPlayer, StoreError> {
        let mut inner = self.inner.lock();
        let player = inner
            .players
            .get_mut(&id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        player.finalize(selected);
        Ok(player.clone())
    }

    async fn delete_round_players(
        &self,
        round_id: RoundId,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let ids = inner.round_players.remove(&round_id).unwrap_or_default();
        for id in &ids {
            if let Some(player) = inner.players.remove(id) {
                inner.player_codes.remove(&(round_id, player.player_code));
            }
        }
        Ok(ids.len())
    }
}

// =========================================================================
// Tests
// =========================================================================
