//! Shared stubs and harness helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gpuflow::config::{SchedulerConfig, ServiceRegistry, ServiceSpec};
use gpuflow::error::{Result, SchedulerError};
use gpuflow::gpu::{GpuMonitor, GpuProcess, ResidentModel};
use gpuflow::scheduler::{CancelRegistry, JobManager, MemoryJobStore, NotificationHub};
use gpuflow::worker::{BackendInvoker, SchedulerWorker};

/// GPU monitor stub with scriptable state. Records every unload call.
#[derive(Default)]
pub struct StubMonitor {
    pub active: Mutex<Vec<GpuProcess>>,
    pub resident: Mutex<Vec<ResidentModel>>,
    pub unloaded: Mutex<Vec<String>>,
    pub fail_unload: bool,
    pub fail_queries: bool,
}

impl StubMonitor {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn busy(process_name: &str) -> Self {
        let monitor = Self::default();
        monitor.active.lock().unwrap().push(GpuProcess {
            pid: 4242,
            name: process_name.to_string(),
            used_memory_mb: 8000,
        });
        monitor
    }

    pub fn with_resident(self, model: &str) -> Self {
        self.resident.lock().unwrap().push(ResidentModel {
            name: model.to_string(),
        });
        self
    }

    pub fn unloaded_models(&self) -> Vec<String> {
        self.unloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl GpuMonitor for StubMonitor {
    async fn active_processes(&self) -> Result<Vec<GpuProcess>> {
        if self.fail_queries {
            return Err(SchedulerError::Monitor("query failed".to_string()));
        }
        Ok(self.active.lock().unwrap().clone())
    }

    async fn resident_models(&self) -> Result<Vec<ResidentModel>> {
        if self.fail_queries {
            return Err(SchedulerError::Monitor("query failed".to_string()));
        }
        Ok(self.resident.lock().unwrap().clone())
    }

    async fn unload_model(&self, name: &str) -> Result<()> {
        if self.fail_unload {
            return Err(SchedulerError::Monitor(format!("cannot unload {name}")));
        }
        self.unloaded.lock().unwrap().push(name.to_string());
        self.resident.lock().unwrap().retain(|m| m.name != name);
        Ok(())
    }
}

/// What a stub invocation should do.
pub enum InvokeBehavior {
    /// Return this result immediately.
    Succeed(serde_json::Value),
    /// Suspend forever; the worker's deadline has to fire.
    NeverReturn,
    /// Surface a 5xx-equivalent failure.
    Unavailable,
    /// Surface a generic invocation failure.
    Fail(String),
}

/// Backend invoker stub. Records payloads in invocation order.
pub struct StubInvoker {
    pub behavior: InvokeBehavior,
    pub healthy: bool,
    pub invocations: Mutex<Vec<serde_json::Value>>,
}

impl StubInvoker {
    pub fn succeeding(result: serde_json::Value) -> Self {
        Self {
            behavior: InvokeBehavior::Succeed(result),
            healthy: true,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: InvokeBehavior::NeverReturn,
            healthy: true,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            behavior: InvokeBehavior::Succeed(serde_json::Value::Null),
            healthy: false,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invoked_payloads(&self) -> Vec<serde_json::Value> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendInvoker for StubInvoker {
    async fn invoke(
        &self,
        _spec: &ServiceSpec,
        payload: &serde_json::Value,
        _deadline: Duration,
    ) -> Result<serde_json::Value> {
        self.invocations.lock().unwrap().push(payload.clone());
        match &self.behavior {
            InvokeBehavior::Succeed(result) => Ok(result.clone()),
            InvokeBehavior::NeverReturn => std::future::pending().await,
            InvokeBehavior::Unavailable => {
                Err(SchedulerError::ServiceUnavailable("stub 500".to_string()))
            }
            InvokeBehavior::Fail(message) => Err(SchedulerError::Invocation(message.clone())),
        }
    }

    async fn probe_health(&self, _spec: &ServiceSpec) -> bool {
        self.healthy
    }
}

/// Registry with one GPU-bound and one shared service, as tests need.
pub fn test_registry() -> ServiceRegistry {
    ServiceRegistry::new()
        .register("comfyui", ServiceSpec::gpu_exclusive("http://127.0.0.1:8188"))
        .register("tts", ServiceSpec::shared("http://127.0.0.1:5002"))
}

/// Config with a short poll interval so tests settle fast.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_default_timeout(Duration::from_secs(5))
}

/// A running scheduler wired to stubs.
pub struct TestWorld {
    pub manager: JobManager,
    pub store: Arc<MemoryJobStore>,
    pub hub: Arc<NotificationHub>,
    pub monitor: Arc<StubMonitor>,
    pub invoker: Arc<StubInvoker>,
    pub shutdown: CancellationToken,
    pub worker: JoinHandle<()>,
}

/// Honor RUST_LOG in test output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestWorld {
    pub fn spawn(monitor: StubMonitor, invoker: StubInvoker, config: SchedulerConfig) -> Self {
        init_tracing();
        let registry = test_registry();
        let store = Arc::new(MemoryJobStore::new());
        let hub = Arc::new(NotificationHub::new());
        let cancels = Arc::new(CancelRegistry::new());
        let monitor = Arc::new(monitor);
        let invoker = Arc::new(invoker);

        let manager = JobManager::new(
            store.clone(),
            hub.clone(),
            cancels.clone(),
            registry.clone(),
            config.default_timeout,
        );

        let worker = SchedulerWorker::new(
            store.clone(),
            hub.clone(),
            cancels,
            registry,
            monitor.clone(),
            invoker.clone(),
            config,
        );

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        Self {
            manager,
            store,
            hub,
            monitor,
            invoker,
            shutdown,
            worker: handle,
        }
    }

    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.worker).await;
    }
}
