//! Host-side control of background generation jobs.

use std::sync::Arc;

use bingo_protocol::{GenerationJob, GridSpec, JobId};
use bingo_store::CardPoolStore;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{
    ChunkPlan, GenerationConfig, GenerationError, JobError, JobRegistry,
    generate_and_save,
};

/// What the host asks for when creating a bunch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub name: String,
    pub grid: GridSpec,
    /// Cards to generate.
    pub count: u64,
}

/// A started job. Dropping it detaches the background task.
#[derive(Debug)]
pub struct GenerationHandle {
    job_id: JobId,
    task: JoinHandle<()>,
}

impl GenerationHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Waits until the job reaches a terminal status.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            tracing::error!(job_id = %self.job_id, error = %e, "generation task panicked");
        }
    }
}

/// Starts, tracks, and cancels bulk generation jobs.
///
/// Cheap to clone; clones share the store and the registry.
pub struct GenerationJobs<S: CardPoolStore> {
    store: Arc<S>,
    registry: Arc<JobRegistry>,
    config: GenerationConfig,
}

impl<S: CardPoolStore> Clone for GenerationJobs<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl<S: CardPoolStore> GenerationJobs<S> {
    pub fn new(store: Arc<S>, registry: Arc<JobRegistry>, config: GenerationConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Creates the bunch, registers a job, and spawns the chunked runner.
    ///
    /// Returns as soon as the job is running; poll
    /// [`get_job_progress`](Self::get_job_progress) for the outcome. Must
    /// be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Bad requests fail here, before anything is stored:
    /// [`JobError::InvalidRequest`] for an empty name or zero count,
    /// [`JobError::Grid`] for an impossible grid. [`JobError::Store`] if
    /// the bunch metadata can't be created.
    pub async fn start(&self, request: GenerationRequest) -> Result<GenerationHandle, JobError> {
        if request.name.trim().is_empty() {
            return Err(JobError::InvalidRequest("bunch name is empty".into()));
        }
        if request.count == 0 {
            return Err(JobError::InvalidRequest("card count must be positive".into()));
        }
        request.grid.validate()?;

        let bunch = self.store.create_bunch(&request.name, request.grid).await?;
        let job_id = self.registry.create(&request.name, bunch.id, request.count);

        let plan = ChunkPlan {
            bunch_id: bunch.id,
            grid: request.grid,
            total: request.count,
            chunk_size: self.config.chunk_size,
        };
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(run_job(store, registry, job_id, plan));

        Ok(GenerationHandle { job_id, task })
    }

    /// A snapshot of the job's progress.
    pub fn get_job_progress(&self, job_id: JobId) -> Result<GenerationJob, JobError> {
        self.registry
            .get_progress(job_id)
            .ok_or(JobError::NotFound(job_id))
    }

    /// Asks a running job to stop at its next chunk boundary.
    ///
    /// Cancelling a job that already finished leaves it as it was. Returns
    /// the job's state after the request.
    pub fn cancel_job(&self, job_id: JobId) -> Result<GenerationJob, JobError> {
        if !self.registry.cancel(job_id) {
            tracing::warn!(%job_id, "cancel ignored, job is not running");
        }
        self.get_job_progress(job_id)
    }

    /// Drops finished jobs older than the configured retention.
    pub fn cleanup_finished(&self) -> usize {
        self.registry.cleanup_finished(self.config.job_retention)
    }
}

/// Body of the spawned task: run the chunks, then record the outcome.
async fn run_job<S: CardPoolStore>(
    store: Arc<S>,
    registry: Arc<JobRegistry>,
    job_id: JobId,
    plan: ChunkPlan,
) {
    let result = generate_and_save(
        store.as_ref(),
        plan,
        |current, _total| {
            registry.update_progress(job_id, current);
        },
        || registry.should_cancel(job_id),
    )
    .await;

    match result {
        Ok(_) => {
            if !registry.complete(job_id) {
                tracing::warn!(%job_id, "job finished writing after it was cancelled");
            }
        }
        Err(GenerationError::Cancelled { .. }) => {
            // Already flagged by whoever cancelled; make sure it sticks.
            registry.cancel(job_id);
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "generation job failed");
            registry.fail(job_id, e.to_string());
        }
    }
}
