//! Queue counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a queue's counters.
///
/// `completed` counts tasks that have finished (either way). The number of
/// entries still waiting is reported separately by
/// [`SequentialTaskQueue::pending`](crate::SequentialTaskQueue::pending).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks that finished, successfully or not.
    pub completed: u64,
    /// Tasks that finished with a value.
    pub succeeded: u64,
    /// Tasks that finished with a failure of any kind.
    pub failed: u64,
}

impl QueueStats {
    /// Tasks submitted but not yet finished (waiting or running).
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: succeeded.saturating_add(failed),
            succeeded,
            failed,
        }
    }
}
