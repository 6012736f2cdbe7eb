//! Dispatch side of the scheduler: admission control against live GPU
//! state, the backend invocation seam, and the polling worker loop that
//! ties them together.

pub mod admission;
pub mod invoker;
pub mod runner;

pub use admission::{AdmissionController, AdmissionDecision, WarmModels};
pub use invoker::{BackendInvoker, HttpInvoker};
pub use runner::SchedulerWorker;
