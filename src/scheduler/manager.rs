use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ServiceRegistry;
use crate::error::{Result, SchedulerError};
use crate::scheduler::job::{Job, JobStatus, NewJob};
use crate::scheduler::notify::{NotificationHub, StatusWatch};
use crate::scheduler::store::JobStore;

/// Per-job cancellation tokens shared between the manager and the worker.
///
/// Explicitly constructed and passed around rather than living in module
/// state. `token` creates on first access from either side, so a
/// cancellation issued before the worker picks the job up is still seen.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self, id: Uuid) -> CancellationToken {
        let mut tokens = self.tokens.lock().expect("cancel registry lock poisoned");
        tokens.entry(id).or_default().clone()
    }

    pub fn cancel(&self, id: Uuid) {
        self.token(id).cancel();
    }

    /// Drop the token once the job is terminal.
    pub fn remove(&self, id: Uuid) {
        let mut tokens = self.tokens.lock().expect("cancel registry lock poisoned");
        tokens.remove(&id);
    }
}

/// Public CRUD and lifecycle surface used by the front end.
///
/// Composes the job store, the notification hub and the cancel registry.
/// Safe to call concurrently from many contexts; every status write goes
/// through the store's per-row compare-and-set.
pub struct JobManager {
    store: Arc<dyn JobStore>,
    hub: Arc<NotificationHub>,
    cancels: Arc<CancelRegistry>,
    registry: ServiceRegistry,
    default_timeout: Duration,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        hub: Arc<NotificationHub>,
        cancels: Arc<CancelRegistry>,
        registry: ServiceRegistry,
        default_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            cancels,
            registry,
            default_timeout,
        }
    }

    /// Persist a new `Pending` job and return it. Never blocks on
    /// scheduling; the worker picks the job up on its next poll.
    pub async fn create_job(
        &self,
        service: impl Into<String>,
        payload: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<Job> {
        let service = service.into();
        if !self.registry.contains(&service) {
            return Err(SchedulerError::UnknownService(service));
        }

        let job = self
            .store
            .create(NewJob {
                service: service.clone(),
                payload,
                timeout: timeout.unwrap_or(self.default_timeout),
            })
            .await?;

        tracing::info!(job_id = %job.id, service, "Job created");
        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        self.store.get(id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.store.list_all().await
    }

    /// Cancel a non-terminal job: mark it `Failed("cancelled")`, notify
    /// subscribers and stop the worker from awaiting any in-flight
    /// invocation. The remote backend is not told to stop; side effects it
    /// produces after this point are outside the scheduler's control.
    /// Cancelling an already-terminal job is a no-op.
    pub async fn cancel_job(&self, id: Uuid) -> Result<()> {
        let job = self.store.get(id).await?;
        if job.is_terminal() {
            return Ok(());
        }

        // Try the pending case first: the worker has not picked the job up,
        // so the registry entry can be pruned here.
        match self
            .store
            .transition(
                id,
                &[JobStatus::Pending],
                JobStatus::Failed,
                None,
                Some(SchedulerError::Cancelled.to_string()),
            )
            .await
        {
            Ok(_) => {
                tracing::info!(job_id = %id, "Job cancelled");
                self.cancels.cancel(id);
                self.cancels.remove(id);
                self.hub.signal(id, JobStatus::Failed);
                return Ok(());
            }
            Err(SchedulerError::InvalidTransition { .. }) => {}
            Err(e) => return Err(e),
        }

        // The job is (or just became) running. Fire the token but leave its
        // removal to the worker, which holds a clone and observes the
        // cancellation; removing it here could let the worker mint a fresh,
        // uncancelled token mid-dispatch.
        match self
            .store
            .transition(
                id,
                &[JobStatus::Running],
                JobStatus::Failed,
                None,
                Some(SchedulerError::Cancelled.to_string()),
            )
            .await
        {
            Ok(_) => {
                tracing::info!(job_id = %id, "Job cancelled");
                self.cancels.cancel(id);
                self.hub.signal(id, JobStatus::Failed);
                Ok(())
            }
            // Lost the race against the worker's terminal write; the job is
            // done either way.
            Err(SchedulerError::InvalidTransition { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Wait handle for a job's status transitions. Waiting never blocks the
    /// worker.
    pub fn subscribe(&self, id: Uuid) -> StatusWatch {
        self.hub.subscribe(id)
    }
}
