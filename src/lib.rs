pub mod config;
pub mod error;
pub mod gpu;
pub mod scheduler;
pub mod worker;

pub use config::{SchedulerConfig, ServiceKind, ServiceRegistry, ServiceSpec};
pub use error::{Result, SchedulerError};
pub use scheduler::{Job, JobManager, JobStatus, JobStore, MemoryJobStore, NotificationHub};
pub use worker::SchedulerWorker;
