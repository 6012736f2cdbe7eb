use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{ServiceKind, ServiceSpec};
use crate::error::SchedulerError;
use crate::gpu::GpuMonitor;
use crate::worker::invoker::BackendInvoker;

/// Outcome of admission control for one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allowed {
        /// Idle resident models unloaded to reclaim headroom.
        preempted: Vec<String>,
    },
    Denied {
        reason: String,
    },
}

/// Models exempt from preemption, e.g. an always-resident embedding model.
///
/// Owned by the admission controller and built once at startup; replaces
/// any notion of an ambient warm-up registry.
#[derive(Debug, Clone, Default)]
pub struct WarmModels {
    names: HashSet<String>,
}

impl WarmModels {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Decides whether a job may take the GPU right now.
///
/// Busy GPU state (an active compute process) is a hard rejection; there
/// is no queued wait because the GPU may stay busy for an externally
/// determined time. Idle-but-occupied state (resident models, no active
/// process) is reclaimed by unloading the idle models before admitting.
pub struct AdmissionController {
    monitor: Arc<dyn GpuMonitor>,
    warm: WarmModels,
}

impl AdmissionController {
    pub fn new(monitor: Arc<dyn GpuMonitor>, warm: WarmModels) -> Self {
        Self { monitor, warm }
    }

    pub async fn decide(
        &self,
        spec: &ServiceSpec,
        invoker: &dyn BackendInvoker,
    ) -> AdmissionDecision {
        if spec.kind == ServiceKind::Shared {
            return AdmissionDecision::Allowed { preempted: vec![] };
        }

        let active = match self.monitor.active_processes().await {
            Ok(active) => active,
            // Cannot tell whether the GPU is busy; fail closed.
            Err(e) => {
                return AdmissionDecision::Denied {
                    reason: e.to_string(),
                }
            }
        };
        if let Some(busy) = active.first() {
            tracing::info!(
                process = %busy.name,
                pid = busy.pid,
                "GPU busy, rejecting admission"
            );
            return AdmissionDecision::Denied {
                reason: SchedulerError::GpuBusy.to_string(),
            };
        }

        // Nothing is executing; reclaim memory held by idle models.
        // Best-effort throughout: query and unload failures are logged and
        // do not block admission.
        let mut preempted = Vec::new();
        let resident = match self.monitor.resident_models().await {
            Ok(resident) => resident,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list resident models, skipping preemption");
                Vec::new()
            }
        };
        for model in resident {
            if self.warm.contains(&model.name) {
                tracing::debug!(model = %model.name, "Model kept warm, not preempted");
                continue;
            }
            match self.monitor.unload_model(&model.name).await {
                Ok(()) => preempted.push(model.name),
                Err(e) => {
                    tracing::warn!(model = %model.name, error = %e, "Failed to unload model");
                }
            }
        }

        if !invoker.probe_health(spec).await {
            return AdmissionDecision::Denied {
                reason: SchedulerError::ServiceUnavailable(spec.endpoint.clone()).to_string(),
            };
        }

        AdmissionDecision::Allowed { preempted }
    }
}
