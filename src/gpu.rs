use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, SchedulerError};

/// A process currently executing on GPU compute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuProcess {
    pub pid: u32,
    pub name: String,
    pub used_memory_mb: u64,
}

/// A model loaded in GPU memory but not necessarily executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentModel {
    pub name: String,
}

/// Narrow view of live GPU state, plus the one command the scheduler may
/// issue: unloading an idle resident model.
///
/// An active compute process means the GPU is busy; a resident model with
/// no active process is an idle occupant eligible for preemption.
#[async_trait]
pub trait GpuMonitor: Send + Sync {
    async fn active_processes(&self) -> Result<Vec<GpuProcess>>;

    async fn resident_models(&self) -> Result<Vec<ResidentModel>>;

    async fn unload_model(&self, name: &str) -> Result<()>;
}

/// Production monitor shelling out to `nvidia-smi` for compute processes
/// and to a model daemon CLI (ollama by default) for resident models.
#[derive(Debug, Clone)]
pub struct NvidiaSmiMonitor {
    /// Binary queried for active compute processes.
    smi_bin: String,
    /// Binary queried for resident models (`<bin> ps`) and commanded to
    /// unload them (`<bin> stop <name>`).
    daemon_bin: String,
}

impl Default for NvidiaSmiMonitor {
    fn default() -> Self {
        Self {
            smi_bin: "nvidia-smi".to_string(),
            daemon_bin: "ollama".to_string(),
        }
    }
}

impl NvidiaSmiMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binaries(smi_bin: impl Into<String>, daemon_bin: impl Into<String>) -> Self {
        Self {
            smi_bin: smi_bin.into(),
            daemon_bin: daemon_bin.into(),
        }
    }

    async fn run(&self, bin: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SchedulerError::Monitor(format!("{bin}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedulerError::Monitor(format!(
                "{bin} exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse `nvidia-smi --query-compute-apps=pid,process_name,used_memory
/// --format=csv,noheader,nounits` output. Lines that do not parse are
/// skipped; nvidia-smi prints nothing when no compute app is running.
fn parse_compute_apps(raw: &str) -> Vec<GpuProcess> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let pid = fields.next()?.parse().ok()?;
            let name = fields.next()?.to_string();
            let used_memory_mb = fields.next()?.parse().unwrap_or(0);
            Some(GpuProcess {
                pid,
                name,
                used_memory_mb,
            })
        })
        .collect()
}

/// Parse `ollama ps` output: a header line followed by one row per loaded
/// model, first column being the model name.
fn parse_daemon_ps(raw: &str) -> Vec<ResidentModel> {
    raw.lines()
        .skip(1)
        .filter_map(|line| {
            let name = line.split_whitespace().next()?;
            Some(ResidentModel {
                name: name.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl GpuMonitor for NvidiaSmiMonitor {
    async fn active_processes(&self) -> Result<Vec<GpuProcess>> {
        let raw = self
            .run(
                &self.smi_bin,
                &[
                    "--query-compute-apps=pid,process_name,used_memory",
                    "--format=csv,noheader,nounits",
                ],
            )
            .await?;
        Ok(parse_compute_apps(&raw))
    }

    async fn resident_models(&self) -> Result<Vec<ResidentModel>> {
        let raw = self.run(&self.daemon_bin, &["ps"]).await?;
        Ok(parse_daemon_ps(&raw))
    }

    async fn unload_model(&self, name: &str) -> Result<()> {
        self.run(&self.daemon_bin, &["stop", name]).await?;
        tracing::info!(model = name, "Model unloaded");
        Ok(())
    }
}
