//! Generation job registry.
//!
//! Holds one [`GenerationJob`] progress record per job. Written by the
//! background runner, read by whoever polls (about once a second), and
//! flipped to `Cancelled` by a host request. A plain mutex-guarded map is
//! enough: every operation is O(1) and contention is a handful of calls
//! per second.
//!
//! # Lifecycle
//!
//! ```text
//! create ──→ [Running] ──update_progress──→ [Running]
//!                │
//!                ├── complete ──→ [Completed]
//!                ├── cancel   ──→ [Cancelled]
//!                └── fail     ──→ [Failed]
//!                                     │
//!                      cleanup_finished (after retention)
//! ```
//!
//! Every arrow out of `Running` is one-way. Calls that arrive after a job
//! left `Running` are ignored, so a late progress update can't bring a
//! cancelled job back.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bingo_protocol::{BunchId, Clock, GenerationJob, JobId, JobStatus, SystemClock};
use parking_lot::Mutex;

/// Process-wide store of generation progress.
///
/// Construct one at startup and share it by `Arc`.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, GenerationJob>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Registers a new running job with `current = 0`.
    pub fn create(&self, name: &str, bunch_id: BunchId, total: u64) -> JobId {
        let job_id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = GenerationJob {
            job_id,
            name: name.to_string(),
            bunch_id,
            status: JobStatus::Running,
            current: 0,
            total,
            start_time: self.clock.now_ms(),
            end_time: None,
            error: None,
        };
        self.jobs.lock().insert(job_id, job);
        tracing::info!(%job_id, %bunch_id, total, "generation job registered");
        job_id
    }

    /// Records progress. Ignored unless the job is running.
    ///
    /// Returns `true` if the update was applied.
    pub fn update_progress(&self, job_id: JobId, current: u64) -> bool {
        match self.jobs.lock().get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Running => {
                job.current = current;
                true
            }
            _ => false,
        }
    }

    /// A snapshot of the job, or `None` if unknown.
    pub fn get_progress(&self, job_id: JobId) -> Option<GenerationJob> {
        self.jobs.lock().get(&job_id).cloned()
    }

    /// What the runner polls between chunks.
    pub fn should_cancel(&self, job_id: JobId) -> bool {
        self.jobs
            .lock()
            .get(&job_id)
            .is_some_and(|job| job.status == JobStatus::Cancelled)
    }

    /// Requests cancellation. Advisory: the runner notices at its next
    /// chunk boundary.
    ///
    /// Returns `true` if the job was running and is now cancelled.
    pub fn cancel(&self, job_id: JobId) -> bool {
        self.finish(job_id, JobStatus::Cancelled, None)
    }

    /// Marks a running job completed.
    pub fn complete(&self, job_id: JobId) -> bool {
        self.finish(job_id, JobStatus::Completed, None)
    }

    /// Marks a running job failed with `message`.
    pub fn fail(&self, job_id: JobId, message: impl Into<String>) -> bool {
        self.finish(job_id, JobStatus::Failed, Some(message.into()))
    }

    /// Drops terminal jobs that ended more than `max_age` ago.
    ///
    /// Running jobs are never dropped. Returns how many were removed.
    pub fn cleanup_finished(&self, max_age: Duration) -> usize {
        let now = self.clock.now_ms();
        let max_age_ms = max_age.as_millis() as u64;
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| match job.end_time {
            Some(end) => now.saturating_sub(end) <= max_age_ms,
            None => true,
        });
        before - jobs.len()
    }

    /// Snapshots of every job, oldest first.
    pub fn list(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<GenerationJob> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.job_id);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    fn finish(&self, job_id: JobId, status: JobStatus, error: Option<String>) -> bool {
        let now = self.clock.now_ms();
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(&job_id) else {
            return false;
        };
        if job.status.is_terminal() {
            tracing::debug!(
                %job_id,
                current = %job.status,
                requested = %status,
                "job already finished, transition ignored"
            );
            return false;
        }
        job.status = status;
        job.end_time = Some(now);
        job.error = error;
        tracing::info!(
            %job_id,
            %status,
            current = job.current,
            total = job.total,
            "generation job finished"
        );
        true
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
