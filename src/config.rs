use std::collections::HashMap;
use std::time::Duration;

/// Category of a backend service, deciding how its jobs are admitted.
///
/// `GpuExclusive` services require sole use of GPU compute and go through
/// admission control before dispatch. `Shared` services are admitted
/// unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    GpuExclusive,
    Shared,
}

/// Static description of one backend service.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Base URL of the service endpoint, e.g. `http://127.0.0.1:8188`.
    pub endpoint: String,
    pub kind: ServiceKind,
}

impl ServiceSpec {
    pub fn gpu_exclusive(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind: ServiceKind::GpuExclusive,
        }
    }

    pub fn shared(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind: ServiceKind::Shared,
        }
    }

    pub fn is_gpu_exclusive(&self) -> bool {
        self.kind == ServiceKind::GpuExclusive
    }
}

/// Read-only mapping from service name to its spec.
///
/// Built once at startup and passed by reference to the components that
/// need it; consumers never mutate it.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceSpec>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, spec: ServiceSpec) -> Self {
        self.services.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Tunables for the scheduler worker.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the worker polls the store for pending jobs.
    pub poll_interval: Duration,
    /// Invocation deadline applied when a job does not carry its own.
    pub default_timeout: Duration,
    /// Deadline for the pre-dispatch health probe of a GPU-bound service.
    pub health_probe_timeout: Duration,
    /// Models that are never preempted, e.g. an always-resident embedding model.
    pub warm_models: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            default_timeout: Duration::from_secs(300),
            health_probe_timeout: Duration::from_secs(2),
            warm_models: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_warm_model(mut self, model: impl Into<String>) -> Self {
        self.warm_models.push(model.into());
        self
    }
}
