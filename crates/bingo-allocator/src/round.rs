//! Round actor: an isolated Tokio task that owns a round's card pool.
//!
//! Every write to a round's player records goes through this task, one
//! command at a time. A join reads the cards everyone else holds and
//! writes the new player's locks before the next command is looked at,
//! so two joins can never be handed the same card.
//!
//! Each join also schedules a selection timeout: a small task that sleeps
//! until the deadline and then sends [`RoundCommand::Timeout`] back into
//! this actor's channel. A manual selection aborts it. Should the abort
//! lose the race, the timeout finds the player already ready and does
//! nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bingo_protocol::{
    AllocationEvent, BunchCard, BunchId, CardDelivery, CardId, Clock,
    NewRoundPlayer, PlayerId, RoundConfig, RoundId, RoundPlayer,
};
use bingo_store::{CardPoolStore, PlayerStore, RoundProvider};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};

use crate::code::generate_code;
use crate::{AllocError, AllocatorConfig};

/// What a joining player gets back: the new record and the full grids of
/// the locked cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRound {
    pub player: RoundPlayer,
    pub cards: Vec<BunchCard>,
}

type Reply<T> = oneshot::Sender<Result<T, AllocError>>;

/// Commands sent to a round actor through its channel.
pub(crate) enum RoundCommand {
    Join {
        reply: Reply<JoinedRound>,
    },

    Select {
        player_id: PlayerId,
        chosen: Vec<CardId>,
        reply: Reply<RoundPlayer>,
    },

    /// Sent by the player's timer, or by a caller forcing the timeout.
    /// The timer has nobody to reply to.
    Timeout {
        player_id: PlayerId,
        reply: Option<Reply<RoundPlayer>>,
    },

    Shutdown,
}

/// Handle to a running round actor.
///
/// Cheap to clone; it's an `mpsc::Sender` wrapper.
#[derive(Clone)]
pub struct RoundHandle {
    round_id: RoundId,
    sender: mpsc::Sender<RoundCommand>,
}

impl RoundHandle {
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Reserves cards for a new player.
    pub async fn join(&self) -> Result<JoinedRound, AllocError> {
        self.request(|reply| RoundCommand::Join { reply }).await
    }

    /// Turns part of a player's locked offer into their permanent cards.
    pub async fn select(
        &self,
        player_id: PlayerId,
        chosen: Vec<CardId>,
    ) -> Result<RoundPlayer, AllocError> {
        self.request(|reply| RoundCommand::Select {
            player_id,
            chosen,
            reply,
        })
        .await
    }

    /// Runs the timeout for `player_id` now.
    pub async fn timeout(&self, player_id: PlayerId) -> Result<RoundPlayer, AllocError> {
        self.request(|reply| RoundCommand::Timeout {
            player_id,
            reply: Some(reply),
        })
        .await
    }

    /// Tells the actor to stop. Pending timeouts are aborted.
    pub async fn shutdown(&self) -> Result<(), AllocError> {
        self.sender
            .send(RoundCommand::Shutdown)
            .await
            .map_err(|_| AllocError::Unavailable(self.round_id))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoundCommand,
    ) -> Result<T, AllocError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| AllocError::Unavailable(self.round_id))?;
        reply_rx
            .await
            .map_err(|_| AllocError::Unavailable(self.round_id))?
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoundActor<S, R> {
    round_id: RoundId,
    store: Arc<S>,
    rounds: Arc<R>,
    clock: Arc<dyn Clock>,
    config: AllocatorConfig,
    events: broadcast::Sender<AllocationEvent>,
    /// Pending selection timeouts, one per player still selecting.
    timers: HashMap<PlayerId, AbortHandle>,
    receiver: mpsc::Receiver<RoundCommand>,
    /// Handed to timer tasks. Weak, so pending timers don't keep the actor
    /// alive once every handle is gone.
    commands: mpsc::WeakSender<RoundCommand>,
}

impl<S, R> RoundActor<S, R>
where
    S: CardPoolStore + PlayerStore,
    R: RoundProvider,
{
    async fn run(mut self) {
        tracing::info!(round_id = %self.round_id, "round actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoundCommand::Join { reply } => {
                    let result = self.handle_join().await;
                    let _ = reply.send(result);
                }
                RoundCommand::Select {
                    player_id,
                    chosen,
                    reply,
                } => {
                    let result = self.handle_select(player_id, chosen).await;
                    let _ = reply.send(result);
                }
                RoundCommand::Timeout { player_id, reply } => {
                    let result = self.handle_timeout(player_id).await;
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                tracing::warn!(
                                    round_id = %self.round_id,
                                    %player_id,
                                    error = %e,
                                    "scheduled timeout failed"
                                );
                            }
                        }
                    }
                }
                RoundCommand::Shutdown => {
                    tracing::info!(round_id = %self.round_id, "round shutting down");
                    break;
                }
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        tracing::info!(round_id = %self.round_id, "round actor stopped");
    }

    // ---------------------------------------------------------------------
    // Join
    // ---------------------------------------------------------------------

    async fn handle_join(&mut self) -> Result<JoinedRound, AllocError> {
        let (bunch_id, delivery) = self.joinable_config().await?;
        let code = self.unused_code().await?;

        let available = self.available_cards(bunch_id).await?;
        let required = delivery.free_cards_delivered;
        if available.len() < required {
            tracing::warn!(
                round_id = %self.round_id,
                available = available.len(),
                required,
                "join refused, not enough free cards"
            );
            return Err(AllocError::InsufficientCards {
                available: available.len(),
                required,
            });
        }

        let now = self.clock.now_ms();
        let deadline = now.saturating_add(delivery.selection_time_seconds.saturating_mul(1000));
        let player = self
            .store
            .insert_player(NewRoundPlayer {
                round_id: self.round_id,
                player_code: code,
                locked_card_ids: pick_cards(available, required),
                selection_deadline: deadline,
                joined_at: now,
            })
            .await?;
        let cards = self.store.cards_by_ids(&player.locked_card_ids).await?;

        self.schedule_timeout(player.id, Duration::from_secs(delivery.selection_time_seconds));

        tracing::info!(
            round_id = %self.round_id,
            player_id = %player.id,
            code = %player.player_code,
            cards = cards.len(),
            deadline,
            "player joined"
        );
        self.publish(AllocationEvent::PlayerJoined {
            round_id: self.round_id,
            player_code: player.player_code.clone(),
            status: player.status,
        });
        self.publish(AllocationEvent::CardsDelivered {
            player: player.clone(),
            cards: cards.clone(),
            deadline,
        });

        Ok(JoinedRound { player, cards })
    }

    async fn joinable_config(&self) -> Result<(BunchId, CardDelivery), AllocError> {
        let round = self.round_config().await?;
        match (round.status.is_joinable(), round.card_bunch_id, round.card_delivery) {
            (true, Some(bunch_id), Some(delivery)) => Ok((bunch_id, delivery)),
            _ => {
                tracing::warn!(
                    round_id = %self.round_id,
                    status = %round.status,
                    "join refused, round not joinable"
                );
                Err(AllocError::RoundNotJoinable(self.round_id))
            }
        }
    }

    async fn unused_code(&self) -> Result<String, AllocError> {
        for _ in 0..self.config.code_attempts {
            let code = generate_code(self.config.code_length);
            if self
                .store
                .player_by_code(self.round_id, &code)
                .await?
                .is_none()
            {
                return Ok(code);
            }
            tracing::debug!(round_id = %self.round_id, %code, "player code taken, retrying");
        }
        tracing::warn!(
            round_id = %self.round_id,
            attempts = self.config.code_attempts,
            "player code generation exhausted"
        );
        Err(AllocError::CodeGenerationExhausted {
            round_id: self.round_id,
            attempts: self.config.code_attempts,
        })
    }

    /// Bunch cards nobody in this round holds, in index order.
    async fn available_cards(&self, bunch_id: BunchId) -> Result<Vec<CardId>, AllocError> {
        let players = self.store.players_in_round(self.round_id).await?;
        let held: HashSet<CardId> = players.iter().flat_map(|p| p.held_card_ids()).collect();
        let all = self.store.card_ids(bunch_id).await?;
        Ok(all.into_iter().filter(|id| !held.contains(id)).collect())
    }

    // ---------------------------------------------------------------------
    // Select
    // ---------------------------------------------------------------------

    async fn handle_select(
        &mut self,
        player_id: PlayerId,
        chosen: Vec<CardId>,
    ) -> Result<RoundPlayer, AllocError> {
        let player = self.load_player(player_id).await?;
        if player.is_ready() {
            return Err(AllocError::AlreadySelected(player_id));
        }
        if player.deadline_passed(self.clock.now_ms()) {
            tracing::warn!(round_id = %self.round_id, %player_id, "selection after deadline");
            return Err(AllocError::DeadlineExpired(player_id));
        }

        let mut seen = HashSet::with_capacity(chosen.len());
        if let Some(&card_id) = chosen
            .iter()
            .find(|&&id| !player.locked_card_ids.contains(&id) || !seen.insert(id))
        {
            return Err(AllocError::InvalidSelection { player_id, card_id });
        }

        let expected = self.delivery().await?.free_cards_to_select;
        if chosen.len() != expected {
            return Err(AllocError::WrongSelectionCount {
                expected,
                got: chosen.len(),
            });
        }

        let player = self.store.save_selection(player_id, chosen).await?;
        self.cancel_timeout(player_id);

        tracing::info!(
            round_id = %self.round_id,
            %player_id,
            cards = player.selected_card_ids.len(),
            "cards selected"
        );
        self.publish(AllocationEvent::CardsConfirmed {
            player: player.clone(),
        });
        self.publish_ready(&player);
        Ok(player)
    }

    // ---------------------------------------------------------------------
    // Timeout
    // ---------------------------------------------------------------------

    async fn handle_timeout(&mut self, player_id: PlayerId) -> Result<RoundPlayer, AllocError> {
        let player = self.load_player(player_id).await?;
        if player.is_ready() {
            tracing::debug!(round_id = %self.round_id, %player_id, "timeout ignored, player ready");
            return Ok(player);
        }

        let on_timeout = self.delivery().await?.free_cards_on_timeout;
        let picked: Vec<CardId> = player
            .locked_card_ids
            .iter()
            .take(on_timeout)
            .copied()
            .collect();
        let player = self.store.save_selection(player_id, picked).await?;
        self.cancel_timeout(player_id);

        tracing::info!(
            round_id = %self.round_id,
            %player_id,
            cards = player.selected_card_ids.len(),
            "selection timed out, cards auto-assigned"
        );
        self.publish(AllocationEvent::CardsAutoAssigned {
            player: player.clone(),
        });
        self.publish_ready(&player);
        Ok(player)
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn round_config(&self) -> Result<RoundConfig, AllocError> {
        self.rounds
            .get_round(self.round_id)
            .await?
            .ok_or(AllocError::RoundNotFound(self.round_id))
    }

    async fn delivery(&self) -> Result<CardDelivery, AllocError> {
        self.round_config()
            .await?
            .card_delivery
            .ok_or(AllocError::RoundNotJoinable(self.round_id))
    }

    async fn load_player(&self, player_id: PlayerId) -> Result<RoundPlayer, AllocError> {
        match self.store.get_player(player_id).await? {
            Some(player) if player.round_id == self.round_id => Ok(player),
            _ => Err(AllocError::PlayerNotFound(player_id)),
        }
    }

    fn schedule_timeout(&mut self, player_id: PlayerId, delay: Duration) {
        let commands = self.commands.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands
                    .send(RoundCommand::Timeout {
                        player_id,
                        reply: None,
                    })
                    .await;
            }
        });
        tracing::debug!(
            round_id = %self.round_id,
            %player_id,
            delay_secs = delay.as_secs(),
            "selection timeout scheduled"
        );
        if let Some(previous) = self.timers.insert(player_id, timer.abort_handle()) {
            previous.abort();
        }
    }

    fn cancel_timeout(&mut self, player_id: PlayerId) {
        if let Some(timer) = self.timers.remove(&player_id) {
            timer.abort();
            tracing::debug!(round_id = %self.round_id, %player_id, "selection timeout cancelled");
        }
    }

    fn publish_ready(&self, player: &RoundPlayer) {
        self.publish(AllocationEvent::PlayerReady {
            round_id: self.round_id,
            player_code: player.player_code.clone(),
            card_count: player.selected_card_ids.len(),
        });
    }

    /// Sends to every subscriber. Having none is fine.
    fn publish(&self, event: AllocationEvent) {
        let _ = self.events.send(event);
    }
}

/// Shuffles the free cards and keeps the first `count`.
///
/// Synchronous so the thread-local RNG never lives across an `.await`.
fn pick_cards(mut available: Vec<CardId>, count: usize) -> Vec<CardId> {
    available.shuffle(&mut rand::rng());
    available.truncate(count);
    available
}

/// Spawns a round actor and returns a handle to it, plus its task.
///
/// `config.channel_size` bounds the command channel; when it fills up,
/// callers wait.
pub(crate) fn spawn_round<S, R>(
    round_id: RoundId,
    store: Arc<S>,
    rounds: Arc<R>,
    clock: Arc<dyn Clock>,
    config: AllocatorConfig,
    events: broadcast::Sender<AllocationEvent>,
) -> (RoundHandle, JoinHandle<()>)
where
    S: CardPoolStore + PlayerStore,
    R: RoundProvider,
{
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let actor = RoundActor {
        round_id,
        store,
        rounds,
        clock,
        config,
        events,
        timers: HashMap::new(),
        receiver: rx,
        commands: tx.downgrade(),
    };

    let task = tokio::spawn(actor.run());

    let handle = RoundHandle {
        round_id,
        sender: tx,
    };
    (handle, task)
}
