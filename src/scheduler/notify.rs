use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use uuid::Uuid;

use crate::scheduler::job::JobStatus;

/// Fan-out of per-job status transitions.
///
/// Each job id gets a `watch` channel carrying its latest status. `watch`
/// is broadcast-safe: any number of subscribers, and a signal arriving
/// between a subscriber's state check and its await is still observed, so
/// no wakeup is ever lost. Subscribers that arrive after a fast transition
/// see the latest status rather than every intermediate one; ordering is
/// preserved, delivery of intermediates is not guaranteed.
#[derive(Debug, Default)]
pub struct NotificationHub {
    channels: Mutex<HashMap<Uuid, watch::Sender<JobStatus>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a status transition for a job.
    pub fn signal(&self, id: Uuid, status: JobStatus) {
        let mut channels = self.channels.lock().expect("notification hub lock poisoned");
        match channels.get(&id) {
            Some(tx) => {
                // send_replace stores the value even when no receiver is
                // alive, so a transition signalled with zero subscribers is
                // still visible to late subscribers.
                tx.send_replace(status);
            }
            None => {
                let (tx, _rx) = watch::channel(status);
                channels.insert(id, tx);
            }
        }
    }

    /// Obtain a wait handle for a job's next status transitions.
    pub fn subscribe(&self, id: Uuid) -> StatusWatch {
        let mut channels = self.channels.lock().expect("notification hub lock poisoned");
        let tx = channels
            .entry(id)
            .or_insert_with(|| watch::channel(JobStatus::Pending).0);
        StatusWatch {
            rx: tx.subscribe(),
        }
    }
}

/// Handle returned by [`NotificationHub::subscribe`].
#[derive(Debug)]
pub struct StatusWatch {
    rx: watch::Receiver<JobStatus>,
}

impl StatusWatch {
    /// Most recently signalled status, without waiting.
    pub fn last(&self) -> JobStatus {
        *self.rx.borrow()
    }

    /// Suspend until the next transition after this handle's current mark,
    /// then return the new status. Does not busy-poll.
    pub async fn changed(&mut self) -> JobStatus {
        if self.rx.changed().await.is_err() {
            // Hub dropped; nothing further will be signalled.
            return *self.rx.borrow();
        }
        *self.rx.borrow_and_update()
    }

    /// Suspend until the job reaches `Completed` or `Failed`.
    pub async fn terminal(&mut self) -> JobStatus {
        loop {
            let current = *self.rx.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }
}
