use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Legal transition graph: status only moves forward, or jumps to
    /// `Failed` from any non-terminal state. Terminal states never change.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Creation parameters for a job. The store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub service: String,
    pub payload: serde_json::Value,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Key into the service registry. Never interpreted beyond lookup.
    pub service: String,
    pub status: JobStatus,
    /// Opaque request blob, passed through to the backend untouched.
    pub payload: serde_json::Value,
    /// Set exactly when `status` is `Completed`.
    pub result: Option<serde_json::Value>,
    /// Set exactly when `status` is `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bounds how long the invoker waits for the backend response.
    pub timeout: Duration,
}

impl Job {
    pub(crate) fn new(params: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service: params.service,
            status: JobStatus::Pending,
            payload: params.payload,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            timeout: params.timeout,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
