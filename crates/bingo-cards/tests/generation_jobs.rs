//! Integration tests for background generation jobs.
//!
//! Tests run on Tokio's current-thread runtime, so the spawned runner only
//! makes progress when the test task yields. That makes "cancel after N
//! chunks" deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bingo_cards::{GenerationConfig, GenerationJobs, GenerationRequest, JobError, JobRegistry};
use bingo_protocol::{
    BunchCard, BunchId, CardBunch, CardId, Grid, GridSpec, JobId, JobStatus, NewBunchCard,
};
use bingo_store::{CardPoolStore, MemoryStore, StoreError};

// =========================================================================
// A store whose batch writes start failing after a number of successes.
// =========================================================================

struct FlakyStore {
    inner: MemoryStore,
    ok_batches: AtomicUsize,
}

impl FlakyStore {
    fn failing_after(batches: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            ok_batches: AtomicUsize::new(batches),
        }
    }
}

impl CardPoolStore for FlakyStore {
    async fn create_bunch(&self, name: &str, grid: GridSpec) -> Result<CardBunch, StoreError> {
        self.inner.create_bunch(name, grid).await
    }

    async fn get_bunch(&self, id: BunchId) -> Result<Option<CardBunch>, StoreError> {
        self.inner.get_bunch(id).await
    }

    async fn list_bunches(&self) -> Result<Vec<CardBunch>, StoreError> {
        self.inner.list_bunches().await
    }

    async fn find_bunches_by_dimensions(&self, grid: GridSpec) -> Result<Vec<CardBunch>, StoreError> {
        self.inner.find_bunches_by_dimensions(grid).await
    }

    async fn delete_bunch(&self, id: BunchId) -> Result<bool, StoreError> {
        self.inner.delete_bunch(id).await
    }

    async fn insert_cards(&self, cards: Vec<NewBunchCard>) -> Result<usize, StoreError> {
        let left = self.ok_batches.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.ok_batches.store(left - 1, Ordering::SeqCst);
        self.inner.insert_cards(cards).await
    }

    async fn card_ids(&self, bunch_id: BunchId) -> Result<Vec<CardId>, StoreError> {
        self.inner.card_ids(bunch_id).await
    }

    async fn cards_by_ids(&self, ids: &[CardId]) -> Result<Vec<BunchCard>, StoreError> {
        self.inner.cards_by_ids(ids).await
    }

    async fn cards_page(
        &self,
        bunch_id: BunchId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<BunchCard>, StoreError> {
        self.inner.cards_page(bunch_id, skip, limit).await
    }

    async fn count_cards(&self, bunch_id: BunchId) -> Result<u64, StoreError> {
        self.inner.count_cards(bunch_id).await
    }

    async fn purge_cards(&self, bunch_id: BunchId) -> Result<u64, StoreError> {
        self.inner.purge_cards(bunch_id).await
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn jobs<S: CardPoolStore>(store: Arc<S>, chunk_size: usize) -> GenerationJobs<S> {
    GenerationJobs::new(
        store,
        Arc::new(JobRegistry::new()),
        GenerationConfig {
            chunk_size,
            ..GenerationConfig::default()
        },
    )
}

fn request(count: u64) -> GenerationRequest {
    GenerationRequest {
        name: "Saturday night".into(),
        grid: GridSpec::new(5, 75),
        count,
    }
}

async fn wait_for_progress<S: CardPoolStore>(jobs: &GenerationJobs<S>, job_id: JobId, at_least: u64) {
    while jobs.get_job_progress(job_id).unwrap().current < at_least {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_start_runs_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let jobs = jobs(Arc::clone(&store), 4);

    let handle = jobs.start(request(10)).await.unwrap();
    let job_id = handle.job_id();
    handle.finished().await;

    let job = jobs.get_job_progress(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current, 10);
    assert_eq!(job.total, 10);
    assert!(job.end_time.is_some());
    assert!(job.error.is_none());

    let bunch = store.get_bunch(job.bunch_id).await.unwrap().unwrap();
    assert_eq!(bunch.name, "Saturday night");
    assert_eq!(bunch.card_count, 10);

    let cards = store.cards_page(job.bunch_id, 0, 100).await.unwrap();
    assert_eq!(cards.len(), 10);
    for (i, card) in cards.iter().enumerate() {
        assert_eq!(card.index, i as u64);
        assert_eq!(card.grid.cell(2, 2), Some(Grid::FREE));
    }
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_written_prefix() {
    let store = Arc::new(MemoryStore::new());
    let jobs = jobs(Arc::clone(&store), 2);

    let handle = jobs.start(request(100)).await.unwrap();
    let job_id = handle.job_id();
    wait_for_progress(&jobs, job_id, 6).await;

    let snapshot = jobs.cancel_job(job_id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    handle.finished().await;

    let job = jobs.get_job_progress(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.current < job.total);
    assert!(job.error.is_none());
    // No progress after the cancel, and the store holds exactly what was reported.
    assert_eq!(job.current, snapshot.current);
    assert_eq!(store.count_cards(job.bunch_id).await.unwrap(), job.current);
}

#[tokio::test]
async fn test_cancel_before_first_chunk() {
    let store = Arc::new(MemoryStore::new());
    let jobs = jobs(Arc::clone(&store), 10);

    let handle = jobs.start(request(50)).await.unwrap();
    let job_id = handle.job_id();
    jobs.cancel_job(job_id).unwrap();
    handle.finished().await;

    let job = jobs.get_job_progress(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.current, 0);
    assert_eq!(store.count_cards(job.bunch_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_after_completion_is_ignored() {
    let jobs = jobs(Arc::new(MemoryStore::new()), 10);
    let handle = jobs.start(request(5)).await.unwrap();
    let job_id = handle.job_id();
    handle.finished().await;

    let job = jobs.cancel_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_store_failure_marks_job_failed_and_keeps_prefix() {
    let store = Arc::new(FlakyStore::failing_after(2));
    let jobs = jobs(Arc::clone(&store), 3);

    let handle = jobs.start(request(20)).await.unwrap();
    let job_id = handle.job_id();
    handle.finished().await;

    let job = jobs.get_job_progress(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.current, 6);
    assert!(job.error.as_deref().unwrap_or_default().contains("connection reset"));
    assert_eq!(store.count_cards(job.bunch_id).await.unwrap(), 6);
}

#[tokio::test]
async fn test_start_rejects_bad_requests_without_storing() {
    let store = Arc::new(MemoryStore::new());
    let jobs = jobs(Arc::clone(&store), 10);

    let bad_grid = GenerationRequest {
        grid: GridSpec::new(5, 20),
        ..request(10)
    };
    assert!(matches!(jobs.start(bad_grid).await, Err(JobError::Grid(_))));

    let empty_name = GenerationRequest {
        name: "  ".into(),
        ..request(10)
    };
    assert!(matches!(jobs.start(empty_name).await, Err(JobError::InvalidRequest(_))));

    assert!(matches!(jobs.start(request(0)).await, Err(JobError::InvalidRequest(_))));

    assert!(store.list_bunches().await.unwrap().is_empty());
    assert!(jobs.registry().is_empty());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let jobs = jobs(Arc::new(MemoryStore::new()), 10);
    assert!(matches!(jobs.get_job_progress(JobId(42)), Err(JobError::NotFound(JobId(42)))));
    assert!(matches!(jobs.cancel_job(JobId(42)), Err(JobError::NotFound(_))));
}

#[tokio::test]
async fn test_deleting_bunch_mid_run_fails_job() {
    let store = Arc::new(MemoryStore::new());
    let jobs = jobs(Arc::clone(&store), 2);

    let handle = jobs.start(request(40)).await.unwrap();
    let job_id = handle.job_id();
    wait_for_progress(&jobs, job_id, 2).await;

    let bunch_id = jobs.get_job_progress(job_id).unwrap().bunch_id;
    assert!(store.delete_bunch(bunch_id).await.unwrap());
    handle.finished().await;

    let job = jobs.get_job_progress(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(store.count_cards(bunch_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cleanup_keeps_fresh_jobs() {
    let jobs = jobs(Arc::new(MemoryStore::new()), 10);
    let handle = jobs.start(request(3)).await.unwrap();
    handle.finished().await;

    // Retention is an hour; the job just finished.
    assert_eq!(jobs.cleanup_finished(), 0);
    assert_eq!(jobs.registry().len(), 1);
}
