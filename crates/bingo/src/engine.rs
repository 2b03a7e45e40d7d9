//! `BingoEngine`: one object wiring generation and allocation to a store.

use std::sync::Arc;

use bingo_allocator::{AllocatorManager, JoinedRound};
use bingo_cards::{GenerationHandle, GenerationJobs, GenerationRequest, JobRegistry};
use bingo_protocol::{
    AllocationEvent, BunchCard, BunchId, CardBunch, CardId, Clock, GenerationJob, GridSpec,
    JobId, PlayerId, RoundId, RoundPlayer, SystemClock,
};
use bingo_store::{CardPoolStore, MemoryStore, PlayerStore, RoundProvider, StaticRounds};
use tokio::sync::broadcast;

use crate::{BingoError, EngineConfig};

/// The card pool engine.
///
/// Host-side calls manage bunches and generation jobs; player-side calls
/// join rounds and pick cards. Both share one store, so cards generated
/// into a bunch are immediately available to rounds that reference it.
///
/// Construct once at startup. Must be used inside a Tokio runtime.
///
/// # Example
///
/// ```rust,no_run
/// use bingo::prelude::*;
///
/// # async fn run() -> Result<(), BingoError> {
/// let engine = BingoEngine::in_memory(EngineConfig::default());
/// let job_id = engine
///     .create_generation_job("Friday", GridSpec::new(5, 75), 10_000)
///     .await?;
/// let job = engine.get_job_progress(job_id)?;
/// println!("{}/{} cards", job.current, job.total);
/// # Ok(())
/// # }
/// ```
pub struct BingoEngine<S: CardPoolStore, R> {
    store: Arc<S>,
    rounds: Arc<R>,
    jobs: GenerationJobs<S>,
    allocator: AllocatorManager<S, R>,
}

impl BingoEngine<MemoryStore, StaticRounds> {
    /// An engine over a fresh in-memory store and round table.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticRounds::new()),
            config,
        )
    }
}

impl<S, R> BingoEngine<S, R>
where
    S: CardPoolStore + PlayerStore,
    R: RoundProvider,
{
    pub fn new(store: Arc<S>, rounds: Arc<R>, config: EngineConfig) -> Self {
        Self::with_clock(store, rounds, Arc::new(SystemClock), config)
    }

    /// Like [`new`](Self::new), with job timestamps and selection
    /// deadlines read from `clock`.
    pub fn with_clock(
        store: Arc<S>,
        rounds: Arc<R>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let registry = Arc::new(JobRegistry::with_clock(Arc::clone(&clock)));
        let jobs = GenerationJobs::new(Arc::clone(&store), registry, config.generation);
        let allocator = AllocatorManager::with_clock(
            Arc::clone(&store),
            Arc::clone(&rounds),
            clock,
            config.allocator,
        );
        Self {
            store,
            rounds,
            jobs,
            allocator,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn rounds(&self) -> &Arc<R> {
        &self.rounds
    }

    pub fn jobs(&self) -> &GenerationJobs<S> {
        &self.jobs
    }

    pub fn allocator(&self) -> &AllocatorManager<S, R> {
        &self.allocator
    }

    // ---------------------------------------------------------------------
    // Generation jobs
    // ---------------------------------------------------------------------

    /// Creates a bunch and starts filling it in the background.
    ///
    /// Returns the job id straight away; poll
    /// [`get_job_progress`](Self::get_job_progress) to follow it.
    pub async fn create_generation_job(
        &self,
        name: &str,
        grid: GridSpec,
        count: u64,
    ) -> Result<JobId, BingoError> {
        let handle = self
            .start_generation(GenerationRequest {
                name: name.to_string(),
                grid,
                count,
            })
            .await?;
        Ok(handle.job_id())
    }

    /// Like [`create_generation_job`](Self::create_generation_job), but
    /// hands back a handle that can be awaited until the job ends.
    pub async fn start_generation(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationHandle, BingoError> {
        Ok(self.jobs.start(request).await?)
    }

    pub fn get_job_progress(&self, job_id: JobId) -> Result<GenerationJob, BingoError> {
        Ok(self.jobs.get_job_progress(job_id)?)
    }

    /// Stops a running job at its next chunk boundary.
    pub fn cancel_job(&self, job_id: JobId) -> Result<GenerationJob, BingoError> {
        Ok(self.jobs.cancel_job(job_id)?)
    }

    pub fn list_jobs(&self) -> Vec<GenerationJob> {
        self.jobs.registry().list()
    }

    /// Forgets finished jobs older than the configured retention.
    pub fn cleanup_finished_jobs(&self) -> usize {
        self.jobs.cleanup_finished()
    }

    // ---------------------------------------------------------------------
    // Bunches
    // ---------------------------------------------------------------------

    pub async fn get_bunch(&self, bunch_id: BunchId) -> Result<Option<CardBunch>, BingoError> {
        Ok(self.store.get_bunch(bunch_id).await?)
    }

    /// Newest first.
    pub async fn list_bunches(&self) -> Result<Vec<CardBunch>, BingoError> {
        Ok(self.store.list_bunches().await?)
    }

    /// Bunches a round with this grid can use, sorted by name.
    pub async fn find_bunches_by_dimensions(
        &self,
        grid: GridSpec,
    ) -> Result<Vec<CardBunch>, BingoError> {
        Ok(self.store.find_bunches_by_dimensions(grid).await?)
    }

    /// Deletes a bunch and all of its cards.
    pub async fn delete_bunch(&self, bunch_id: BunchId) -> Result<bool, BingoError> {
        let deleted = self.store.delete_bunch(bunch_id).await?;
        if !deleted {
            tracing::warn!(%bunch_id, "delete ignored, bunch not found");
        }
        Ok(deleted)
    }

    pub async fn count_cards(&self, bunch_id: BunchId) -> Result<u64, BingoError> {
        Ok(self.store.count_cards(bunch_id).await?)
    }

    /// A page of a bunch's cards, by index.
    pub async fn cards_page(
        &self,
        bunch_id: BunchId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<BunchCard>, BingoError> {
        Ok(self.store.cards_page(bunch_id, skip, limit).await?)
    }

    /// Empties a bunch but keeps it.
    pub async fn purge_cards(&self, bunch_id: BunchId) -> Result<u64, BingoError> {
        Ok(self.store.purge_cards(bunch_id).await?)
    }

    // ---------------------------------------------------------------------
    // Rounds
    // ---------------------------------------------------------------------

    pub async fn join_round(&self, round_id: RoundId) -> Result<JoinedRound, BingoError> {
        Ok(self.allocator.join_round(round_id).await?)
    }

    pub async fn select_cards(
        &self,
        player_id: PlayerId,
        chosen: Vec<CardId>,
    ) -> Result<RoundPlayer, BingoError> {
        Ok(self.allocator.select_cards(player_id, chosen).await?)
    }

    pub async fn handle_timeout(&self, player_id: PlayerId) -> Result<RoundPlayer, BingoError> {
        Ok(self.allocator.handle_timeout(player_id).await?)
    }

    /// Allocation events for the real-time transport.
    pub fn subscribe(&self) -> broadcast::Receiver<AllocationEvent> {
        self.allocator.subscribe()
    }

    pub async fn close_round(&self, round_id: RoundId) -> bool {
        self.allocator.close_round(round_id).await
    }

    /// Closes the round and deletes its players, returning every card they
    /// held to the pool.
    pub async fn reset_round(&self, round_id: RoundId) -> Result<usize, BingoError> {
        Ok(self.allocator.reset_round(round_id).await?)
    }

    pub async fn players_in_round(&self, round_id: RoundId) -> Result<Vec<RoundPlayer>, BingoError> {
        Ok(self.allocator.players_in_round(round_id).await?)
    }

    pub async fn player_by_code(
        &self,
        round_id: RoundId,
        code: &str,
    ) -> Result<Option<RoundPlayer>, BingoError> {
        Ok(self.allocator.player_by_code(round_id, code).await?)
    }

    pub async fn count_players(&self, round_id: RoundId) -> Result<usize, BingoError> {
        Ok(self.allocator.count_players(round_id).await?)
    }

    pub async fn player_cards(&self, player_id: PlayerId) -> Result<Vec<BunchCard>, BingoError> {
        Ok(self.allocator.player_cards(player_id).await?)
    }
}
