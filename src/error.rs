use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::JobStatus;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("gpu busy")]
    GpuBusy,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("job timeout")]
    Timeout,

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("gpu monitor error: {0}")]
    Monitor(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
