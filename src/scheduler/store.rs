use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::scheduler::job::{Job, JobStatus, NewJob};

/// Persistence seam for job records. Pure CRUD, no scheduling policy.
///
/// Implementations must make each operation atomic with respect to a single
/// job row; `transition` is the compare-and-set primitive every status
/// writer goes through.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new `Pending` job. The store assigns the id.
    async fn create(&self, params: NewJob) -> Result<Job>;

    async fn get(&self, id: Uuid) -> Result<Job>;

    /// Atomically move a job to `to`, provided its current status is one of
    /// `from`. Returns the updated row, or `InvalidTransition` when the job
    /// already moved on (e.g. a cancellation won the race).
    async fn transition(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<Job>;

    /// Pending jobs in FIFO order: `created_at` ascending, insertion order
    /// breaking ties.
    async fn list_pending(&self) -> Result<Vec<Job>>;

    /// All jobs, FIFO order. Rows are never deleted by the scheduler.
    async fn list_all(&self) -> Result<Vec<Job>>;
}

#[derive(Debug)]
struct JobRow {
    seq: u64,
    job: Job,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, JobRow>,
    next_seq: u64,
}

/// In-memory `JobStore` backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: RwLock<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, params: NewJob) -> Result<Job> {
        let job = Job::new(params);
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(job.id, JobRow { seq, job: job.clone() });
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Job> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(&id)
            .map(|row| row.job.clone())
            .ok_or(SchedulerError::JobNotFound(id))
    }

    async fn transition(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let row = inner
            .jobs
            .get_mut(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;

        let current = row.job.status;
        if !from.contains(&current) || !current.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition { from: current, to });
        }

        row.job.status = to;
        row.job.result = result;
        row.job.error = error;
        row.job.updated_at = chrono::Utc::now();
        Ok(row.job.clone())
    }

    async fn list_pending(&self) -> Result<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&JobRow> = inner
            .jobs
            .values()
            .filter(|row| row.job.status == JobStatus::Pending)
            .collect();
        rows.sort_by_key(|row| (row.job.created_at, row.seq));
        Ok(rows.iter().map(|row| row.job.clone()).collect())
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&JobRow> = inner.jobs.values().collect();
        rows.sort_by_key(|row| (row.job.created_at, row.seq));
        Ok(rows.iter().map(|row| row.job.clone()).collect())
    }
}
