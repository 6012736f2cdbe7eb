pub mod job;
pub mod manager;
pub mod notify;
pub mod store;

pub use job::{Job, JobStatus, NewJob};
pub use manager::{CancelRegistry, JobManager};
pub use notify::{NotificationHub, StatusWatch};
pub use store::{JobStore, MemoryJobStore};
