//! Allocator manager: spawns round actors on demand and routes calls to
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use bingo_protocol::{
    AllocationEvent, BunchCard, CardId, Clock, PlayerId, RoundId, RoundPlayer, SystemClock,
};
use bingo_store::{CardPoolStore, PlayerStore, RoundProvider};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::round::spawn_round;
use crate::{AllocError, AllocatorConfig, JoinedRound, RoundHandle};

/// A round's entry in the actor map.
enum RoundSlot {
    Running {
        handle: RoundHandle,
        task: JoinHandle<()>,
    },
    /// Being torn down. No actor may be spawned for the round until the
    /// old one has exited and the slot is removed.
    Closing,
}

/// Entry point for player-side allocation.
///
/// Writes go through one actor per round, spawned the first time the
/// round is touched. Read-only queries go straight to the store.
///
/// Must be used inside a Tokio runtime.
pub struct AllocatorManager<S, R> {
    store: Arc<S>,
    rounds: Arc<R>,
    clock: Arc<dyn Clock>,
    config: AllocatorConfig,
    /// At most one actor per round, ever.
    actors: Arc<Mutex<HashMap<RoundId, RoundSlot>>>,
    events: broadcast::Sender<AllocationEvent>,
}

impl<S, R> AllocatorManager<S, R>
where
    S: CardPoolStore + PlayerStore,
    R: RoundProvider,
{
    pub fn new(store: Arc<S>, rounds: Arc<R>, config: AllocatorConfig) -> Self {
        Self::with_clock(store, rounds, Arc::new(SystemClock), config)
    }

    /// Like [`new`](Self::new), reading deadlines from `clock`.
    pub fn with_clock(
        store: Arc<S>,
        rounds: Arc<R>,
        clock: Arc<dyn Clock>,
        config: AllocatorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            store,
            rounds,
            clock,
            config,
            actors: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Receives every allocation event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AllocationEvent> {
        self.events.subscribe()
    }

    /// Adds a new player to a round and locks a fresh set of cards for
    /// them.
    ///
    /// # Errors
    /// [`AllocError::RoundNotFound`], [`AllocError::RoundNotJoinable`],
    /// [`AllocError::CodeGenerationExhausted`],
    /// [`AllocError::InsufficientCards`], or a store failure.
    pub async fn join_round(&self, round_id: RoundId) -> Result<JoinedRound, AllocError> {
        // Unknown rounds don't get an actor.
        if self.rounds.get_round(round_id).await?.is_none() {
            return Err(AllocError::RoundNotFound(round_id));
        }
        self.round(round_id)?.join().await
    }

    /// Confirms a player's choice from their locked cards.
    ///
    /// On success the chosen cards become permanent and every other locked
    /// card goes back to the pool.
    ///
    /// # Errors
    /// Checked in this order: [`AllocError::PlayerNotFound`],
    /// [`AllocError::AlreadySelected`], [`AllocError::DeadlineExpired`],
    /// [`AllocError::InvalidSelection`], [`AllocError::WrongSelectionCount`].
    /// A refused selection leaves the record unchanged.
    pub async fn select_cards(
        &self,
        player_id: PlayerId,
        chosen: Vec<CardId>,
    ) -> Result<RoundPlayer, AllocError> {
        let round_id = self.player_round(player_id).await?;
        self.round(round_id)?.select(player_id, chosen).await
    }

    /// Auto-assigns cards to a player still selecting.
    ///
    /// Runs on its own when a deadline passes; calling it directly forces
    /// the timeout early. A player already ready is returned unchanged.
    pub async fn handle_timeout(&self, player_id: PlayerId) -> Result<RoundPlayer, AllocError> {
        let round_id = self.player_round(player_id).await?;
        self.round(round_id)?.timeout(player_id).await
    }

    /// Stops the round's actor and aborts its pending timeouts.
    ///
    /// Commands already queued run first. Joins arriving while the actor
    /// drains fail with [`AllocError::Unavailable`]; once this returns, the
    /// next join starts a fresh actor. Player records stay in the store.
    /// Returns `false` if no actor was running for the round.
    pub async fn close_round(&self, round_id: RoundId) -> bool {
        let actor = match self.mark_closing(round_id, false) {
            Ok(Some(actor)) => actor,
            Ok(None) | Err(_) => return false,
        };
        if let Err(e) = self.teardown(round_id, Some(actor), false).await {
            tracing::warn!(%round_id, error = %e, "round teardown failed");
        }
        tracing::info!(%round_id, "round closed");
        true
    }

    /// Closes the round and deletes all of its players, which frees every
    /// card and code they held. Returns how many players were removed.
    ///
    /// # Errors
    /// [`AllocError::Unavailable`] if the round is already being torn
    /// down, or a store failure.
    pub async fn reset_round(&self, round_id: RoundId) -> Result<usize, AllocError> {
        let actor = self.mark_closing(round_id, true)?;
        let removed = self.teardown(round_id, actor, true).await?;
        tracing::info!(%round_id, removed, "round reset");
        Ok(removed)
    }

    /// Rounds with a running actor, in id order.
    pub fn active_rounds(&self) -> Vec<RoundId> {
        let mut ids: Vec<RoundId> = self
            .actors
            .lock()
            .iter()
            .filter(|(_, slot)| {
                matches!(slot, RoundSlot::Running { handle, .. } if !handle.is_closed())
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// All players of a round, in join order.
    pub async fn players_in_round(&self, round_id: RoundId) -> Result<Vec<RoundPlayer>, AllocError> {
        Ok(self.store.players_in_round(round_id).await?)
    }

    /// Looks a player up by the code they were shown. Case-insensitive.
    pub async fn player_by_code(
        &self,
        round_id: RoundId,
        code: &str,
    ) -> Result<Option<RoundPlayer>, AllocError> {
        Ok(self.store.player_by_code(round_id, code).await?)
    }

    pub async fn count_players(&self, round_id: RoundId) -> Result<usize, AllocError> {
        Ok(self.store.count_players(round_id).await?)
    }

    /// The grids a player currently sees: the locked offer while
    /// selecting, the permanent cards once ready.
    pub async fn player_cards(&self, player_id: PlayerId) -> Result<Vec<BunchCard>, AllocError> {
        let player = self
            .store
            .get_player(player_id)
            .await?
            .ok_or(AllocError::PlayerNotFound(player_id))?;
        Ok(self.store.cards_by_ids(player.visible_card_ids()).await?)
    }

    // ---------------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------------

    async fn player_round(&self, player_id: PlayerId) -> Result<RoundId, AllocError> {
        self.store
            .get_player(player_id)
            .await?
            .map(|player| player.round_id)
            .ok_or(AllocError::PlayerNotFound(player_id))
    }

    /// The round's actor, spawning it if none is running.
    fn round(&self, round_id: RoundId) -> Result<RoundHandle, AllocError> {
        let mut actors = self.actors.lock();
        match actors.get(&round_id) {
            Some(RoundSlot::Closing) => return Err(AllocError::Unavailable(round_id)),
            Some(RoundSlot::Running { handle, .. }) if !handle.is_closed() => {
                return Ok(handle.clone());
            }
            _ => {}
        }

        let (handle, task) = spawn_round(
            round_id,
            Arc::clone(&self.store),
            Arc::clone(&self.rounds),
            Arc::clone(&self.clock),
            self.config.clone(),
            self.events.clone(),
        );
        actors.insert(
            round_id,
            RoundSlot::Running {
                handle: handle.clone(),
                task,
            },
        );
        tracing::debug!(%round_id, "round actor spawned");
        Ok(handle)
    }

    /// Swaps the round's slot for [`RoundSlot::Closing`] and hands back the
    /// actor it held. With `claim_idle`, a round without an actor is
    /// marked closing too.
    fn mark_closing(
        &self,
        round_id: RoundId,
        claim_idle: bool,
    ) -> Result<Option<(RoundHandle, JoinHandle<()>)>, AllocError> {
        let mut actors = self.actors.lock();
        match actors.insert(round_id, RoundSlot::Closing) {
            Some(RoundSlot::Running { handle, task }) => Ok(Some((handle, task))),
            Some(RoundSlot::Closing) => Err(AllocError::Unavailable(round_id)),
            None => {
                if !claim_idle {
                    actors.remove(&round_id);
                }
                Ok(None)
            }
        }
    }

    /// Stops the actor, optionally deletes the round's players, then frees
    /// the slot.
    ///
    /// Runs as its own task so a caller that gives up halfway can't leave
    /// the round stuck in [`RoundSlot::Closing`].
    async fn teardown(
        &self,
        round_id: RoundId,
        actor: Option<(RoundHandle, JoinHandle<()>)>,
        delete_players: bool,
    ) -> Result<usize, AllocError> {
        let actors = Arc::clone(&self.actors);
        let store = Arc::clone(&self.store);

        let task = tokio::spawn(async move {
            if let Some((handle, task)) = actor {
                if handle.shutdown().await.is_err() {
                    tracing::debug!(%round_id, "round actor already stopped");
                }
                drop(handle);
                if let Err(e) = task.await {
                    tracing::warn!(%round_id, error = %e, "round actor task failed");
                }
            }
            let removed = if delete_players {
                store.delete_round_players(round_id).await
            } else {
                Ok(0)
            };
            actors.lock().remove(&round_id);
            removed
        });

        match task.await {
            Ok(removed) => Ok(removed?),
            Err(e) => {
                tracing::error!(%round_id, error = %e, "round teardown task failed");
                Err(AllocError::Unavailable(round_id))
            }
        }
    }
}
