use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{SchedulerConfig, ServiceRegistry};
use crate::error::SchedulerError;
use crate::gpu::GpuMonitor;
use crate::scheduler::{CancelRegistry, Job, JobStatus, JobStore, NotificationHub};
use crate::worker::admission::{AdmissionController, AdmissionDecision, WarmModels};
use crate::worker::invoker::BackendInvoker;

/// The scheduling loop: polls for pending jobs and dispatches them one at
/// a time.
///
/// Jobs are processed strictly sequentially, in `created_at` order. The
/// GPU has no safe concurrent-access model, so admission concurrency is
/// exactly one regardless of how many services exist; non-GPU jobs ride
/// the same loop for simplicity. This task is the only writer of
/// non-cancellation status transitions.
pub struct SchedulerWorker {
    store: Arc<dyn JobStore>,
    hub: Arc<NotificationHub>,
    cancels: Arc<CancelRegistry>,
    registry: ServiceRegistry,
    admission: AdmissionController,
    invoker: Arc<dyn BackendInvoker>,
    config: SchedulerConfig,
}

impl SchedulerWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        hub: Arc<NotificationHub>,
        cancels: Arc<CancelRegistry>,
        registry: ServiceRegistry,
        monitor: Arc<dyn GpuMonitor>,
        invoker: Arc<dyn BackendInvoker>,
        config: SchedulerConfig,
    ) -> Self {
        let warm = WarmModels::new(config.warm_models.iter().cloned());
        Self {
            store,
            hub,
            cancels,
            registry,
            admission: AdmissionController::new(monitor, warm),
            invoker,
            config,
        }
    }

    /// Run until `shutdown` fires. An in-flight job always finishes (or
    /// hits its deadline) before this returns; the token is only checked
    /// between jobs, never mid-dispatch, so no job is orphaned in
    /// `Running`.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Scheduler worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler worker stopped");
                    return;
                }
                _ = interval.tick() => {
                    let pending = match self.store.list_pending().await {
                        Ok(pending) => pending,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to list pending jobs");
                            continue;
                        }
                    };

                    for job in pending {
                        self.dispatch(job).await;
                        if shutdown.is_cancelled() {
                            tracing::info!("Scheduler worker stopped");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, job: Job) {
        // Claim the job. Losing this race means a cancellation got there
        // first; leave the row alone.
        let job = match self
            .store
            .transition(job.id, &[JobStatus::Pending], JobStatus::Running, None, None)
            .await
        {
            Ok(job) => job,
            Err(SchedulerError::InvalidTransition { .. }) => {
                tracing::debug!(job_id = %job.id, "Job no longer pending, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to claim job");
                return;
            }
        };
        self.hub.signal(job.id, JobStatus::Running);
        tracing::info!(job_id = %job.id, service = %job.service, "Dispatching job");

        // Grab the cancel token before admission runs: a cancellation
        // landing during the admission awaits must be the same token the
        // invocation is raced against.
        let cancel = self.cancels.token(job.id);

        let Some(spec) = self.registry.get(&job.service) else {
            // Creation validates the service name; reaching this means the
            // registry and the store disagree.
            self.fail(&job, SchedulerError::UnknownService(job.service.clone()).to_string())
                .await;
            self.cancels.remove(job.id);
            return;
        };

        match self.admission.decide(spec, self.invoker.as_ref()).await {
            AdmissionDecision::Allowed { preempted } => {
                if !preempted.is_empty() {
                    tracing::info!(
                        job_id = %job.id,
                        models = ?preempted,
                        "Preempted idle models before dispatch"
                    );
                }
            }
            AdmissionDecision::Denied { reason } => {
                self.fail(&job, reason).await;
                self.cancels.remove(job.id);
                return;
            }
        }

        let invocation = tokio::select! {
            _ = cancel.cancelled() => {
                // The manager already wrote Failed("cancelled"); stop
                // waiting and write nothing. The backend call is dropped,
                // not aborted remotely.
                tracing::info!(job_id = %job.id, "Job cancelled mid-flight");
                self.cancels.remove(job.id);
                return;
            }
            res = tokio::time::timeout(
                job.timeout,
                self.invoker.invoke(spec, &job.payload, job.timeout),
            ) => res.unwrap_or(Err(SchedulerError::Timeout)),
        };

        match invocation {
            Ok(result) => self.complete(&job, result).await,
            Err(e) => self.fail(&job, e.to_string()).await,
        }
        self.cancels.remove(job.id);
    }

    async fn complete(&self, job: &Job, result: serde_json::Value) {
        match self
            .store
            .transition(
                job.id,
                &[JobStatus::Running],
                JobStatus::Completed,
                Some(result),
                None,
            )
            .await
        {
            Ok(_) => {
                tracing::info!(job_id = %job.id, service = %job.service, "Job completed");
                self.hub.signal(job.id, JobStatus::Completed);
            }
            // A concurrent cancellation already ended the job; a stale
            // success must not overwrite it.
            Err(SchedulerError::InvalidTransition { .. }) => {
                tracing::debug!(job_id = %job.id, "Job already terminal, dropping result");
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to persist job result");
            }
        }
    }

    async fn fail(&self, job: &Job, reason: String) {
        match self
            .store
            .transition(
                job.id,
                &[JobStatus::Running],
                JobStatus::Failed,
                None,
                Some(reason.clone()),
            )
            .await
        {
            Ok(_) => {
                tracing::info!(job_id = %job.id, service = %job.service, reason, "Job failed");
                self.hub.signal(job.id, JobStatus::Failed);
            }
            Err(SchedulerError::InvalidTransition { .. }) => {
                tracing::debug!(job_id = %job.id, "Job already terminal, dropping failure");
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to persist job failure");
            }
        }
    }
}
