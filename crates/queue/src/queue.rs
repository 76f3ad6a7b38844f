//! Sequential FIFO executor for asynchronous tasks.
//!
//! Submissions are appended to a pending sequence and executed one at a time
//! by a single drain loop. Each submission gets its own [`OutcomeHandle`]; a
//! failing task is reported to its handle only and the loop moves on.
//!
//! # Example
//!
//! ```ignore
//! use ordo_queue::SequentialTaskQueue;
//!
//! let queue = SequentialTaskQueue::<String, String>::new()?;
//!
//! let slow = queue.submit(|| async {
//!     tokio::time::sleep(Duration::from_millis(300)).await;
//!     Ok("slow".to_string())
//! });
//! let fast = queue.submit(|| async { Ok("fast".to_string()) });
//!
//! // `fast` starts only after `slow` has finished.
//! assert_eq!(slow.await?, "slow");
//! assert_eq!(fast.await?, "fast");
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{Notify, broadcast, oneshot};
use tracing::{debug, trace, warn};

use ordo_core::{Error, Result};

use crate::config::QueueConfig;
use crate::error::{FailureKind, InvalidTask, QueueError, QueueResult};
use crate::event::QueueEvent;
use crate::outcome::OutcomeHandle;
use crate::stats::{Counters, QueueStats};
use crate::task::{IntoTask, TaskFuture, TaskId};

/// Observable state of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// No drain loop is running.
    Idle,
    /// A drain loop is executing pending entries.
    Draining,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Draining => write!(f, "draining"),
        }
    }
}

type Invoker<T, E> = Box<dyn FnOnce() -> std::result::Result<TaskFuture<T, E>, InvalidTask> + Send>;

/// One pending unit of work. Owned by the queue until its outcome is delivered.
struct QueueEntry<T, E> {
    id: TaskId,
    task: Invoker<T, E>,
    outcome: oneshot::Sender<QueueResult<T, E>>,
}

/// Mutable queue state. Only touched inside short, non-async critical sections.
struct QueueInner<T, E> {
    pending: VecDeque<QueueEntry<T, E>>,
    running: Option<TaskId>,
    active: bool,
}

struct Shared<T, E> {
    name: String,
    runtime: Handle,
    inner: Mutex<QueueInner<T, E>>,
    counters: Counters,
    next_id: AtomicU64,
    events: broadcast::Sender<QueueEvent>,
    idle: Notify,
}

/// FIFO queue that runs asynchronous tasks strictly one at a time.
///
/// Cloning yields another handle to the same queue. Independent queues share
/// nothing.
pub struct SequentialTaskQueue<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for SequentialTaskQueue<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> SequentialTaskQueue<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a queue with default configuration on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if called outside a Tokio runtime.
    pub fn new() -> Result<Self> {
        Self::from_config(QueueConfig::default())
    }

    /// Create a queue from configuration on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or if called outside a
    /// Tokio runtime.
    pub fn from_config(config: QueueConfig) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| Error::runtime_unavailable(e.to_string()))?;
        Self::with_handle(config, runtime)
    }

    /// Create a queue whose drain loops run on the given runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_handle(config: QueueConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            shared: Arc::new(Shared {
                name: config.name,
                runtime,
                inner: Mutex::new(QueueInner {
                    pending: VecDeque::new(),
                    running: None,
                    active: false,
                }),
                counters: Counters::default(),
                next_id: AtomicU64::new(1),
                events,
                idle: Notify::new(),
            }),
        })
    }

    /// Append a task to the queue and return its outcome handle.
    ///
    /// Never fails synchronously. The task is invoked only once every
    /// previously submitted task has finished; if it cannot be invoked the
    /// handle resolves with [`QueueError::InvalidTask`].
    pub fn submit<K>(&self, task: K) -> OutcomeHandle<T, E>
    where
        K: IntoTask<T, E>,
    {
        let shared = &self.shared;
        let id = TaskId::new(shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (outcome, receiver) = oneshot::channel();
        let entry = QueueEntry {
            id,
            task: Box::new(move || task.invoke()),
            outcome,
        };

        let start_drain = {
            let mut inner = shared.inner.lock();
            shared.counters.record_submitted();
            inner.pending.push_back(entry);
            shared.emit(QueueEvent::Submitted { task_id: id });

            let was_active = std::mem::replace(&mut inner.active, true);
            if !was_active {
                shared.emit(QueueEvent::Draining);
            }
            !was_active
        };

        debug!(queue = %shared.name, task_id = %id, "task submitted");

        if start_drain {
            debug!(queue = %shared.name, "starting drain loop");
            shared.runtime.spawn(drain(Arc::clone(shared)));
        }

        OutcomeHandle::new(id, receiver)
    }
}

impl<T, E> SequentialTaskQueue<T, E> {
    /// Queue name from its configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> QueueState {
        if self.shared.inner.lock().active {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    /// Number of entries waiting to start. The running task is not included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }

    /// Snapshot of the queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.shared.counters.snapshot()
    }

    /// Subscribe to lifecycle events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Wait until the queue is idle. Returns immediately if it already is.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            if self.state() == QueueState::Idle {
                return;
            }

            notified.await;
        }
    }
}

impl<T, E> fmt::Debug for SequentialTaskQueue<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("SequentialTaskQueue")
            .field("name", &self.shared.name)
            .field("active", &inner.active)
            .field("pending", &inner.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T, E> Shared<T, E> {
    fn emit(&self, event: QueueEvent) {
        trace!(queue = %self.name, event = event.name(), task_id = ?event.task_id(), "queue event");
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }

    /// Pop the head entry, or mark the queue idle if there is none.
    ///
    /// Both happen under one lock so a concurrent `submit` either sees the
    /// loop still active or starts a new one.
    fn next_entry(&self) -> Option<QueueEntry<T, E>> {
        let entry = {
            let mut inner = self.inner.lock();
            let entry = inner.pending.pop_front();
            inner.running = entry.as_ref().map(|e| e.id);
            if entry.is_none() {
                inner.active = false;
                self.emit(QueueEvent::Idle);
            }
            entry
        };

        if entry.is_none() {
            debug!(queue = %self.name, "drain loop finished, queue idle");
            self.idle.notify_waiters();
        }
        entry
    }

    /// Run one entry to completion and deliver its outcome.
    async fn run_entry(&self, entry: QueueEntry<T, E>) {
        let QueueEntry { id, task, outcome } = entry;

        self.emit(QueueEvent::Started { task_id: id });
        debug!(queue = %self.name, task_id = %id, "task started");

        let result = execute(task).await;

        match &result {
            Ok(_) => {
                self.counters.record_success();
                self.emit(QueueEvent::Succeeded { task_id: id });
                debug!(queue = %self.name, task_id = %id, "task succeeded");
            }
            Err(err) => {
                let kind = err.kind();
                self.counters.record_failure();
                self.emit(QueueEvent::Failed { task_id: id, kind });
                match err {
                    QueueError::Panicked { message } => {
                        warn!(queue = %self.name, task_id = %id, panic = %message, "task panicked");
                    }
                    _ => debug!(queue = %self.name, task_id = %id, kind = %kind, "task failed"),
                }
            }
        }

        if outcome.send(result).is_err() {
            debug!(queue = %self.name, task_id = %id, "outcome handle dropped, result discarded");
        }
    }

    /// Called when a drain loop is torn down before it finished, which only
    /// happens when its runtime shuts down or was already gone. Remaining
    /// entries, and the one that was running, are released so their handles
    /// resolve with `Dropped` and are counted as failed. The next `submit`
    /// starts over.
    fn abandon_drain(&self) {
        let orphaned = {
            let mut inner = self.inner.lock();
            let orphaned = std::mem::take(&mut inner.pending);
            let dropped = inner
                .running
                .take()
                .into_iter()
                .chain(orphaned.iter().map(|entry| entry.id));

            for task_id in dropped {
                self.counters.record_failure();
                self.emit(QueueEvent::Failed {
                    task_id,
                    kind: FailureKind::Dropped,
                });
            }

            inner.active = false;
            self.emit(QueueEvent::Idle);
            orphaned
        };

        if !orphaned.is_empty() {
            warn!(
                queue = %self.name,
                dropped = orphaned.len(),
                "drain loop cancelled, dropping pending tasks"
            );
        }
        drop(orphaned);
        self.idle.notify_waiters();
    }
}

/// Resets the queue if the drain future is dropped before it finished.
struct DrainGuard<T, E> {
    shared: Arc<Shared<T, E>>,
    finished: bool,
}

impl<T, E> DrainGuard<T, E> {
    /// Mark the drain as finished normally.
    fn disarm(&mut self) {
        self.finished = true;
    }
}

impl<T, E> Drop for DrainGuard<T, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.abandon_drain();
        }
    }
}

/// The drain loop: execute head entries until the pending sequence is empty.
///
/// The guard is created before the future is first polled, so a loop that is
/// spawned onto a runtime that never runs it still releases the queue.
fn drain<T, E>(shared: Arc<Shared<T, E>>) -> impl Future<Output = ()> + Send + 'static
where
    T: Send + 'static,
    E: Send + 'static,
{
    let mut guard = DrainGuard {
        shared,
        finished: false,
    };

    async move {
        while let Some(entry) = guard.shared.next_entry() {
            guard.shared.run_entry(entry).await;
        }
        guard.disarm();
    }
}

/// Invoke a task and await it, turning panics into failures.
async fn execute<T, E>(task: Invoker<T, E>) -> QueueResult<T, E> {
    let future = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(future)) => future,
        Ok(Err(invalid)) => return Err(invalid.into()),
        Err(payload) => return Err(QueueError::panicked(panic_message(payload.as_ref()))),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.map_err(QueueError::Task),
        Err(payload) => Err(QueueError::panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = SequentialTaskQueue::<i32, String>::new();
        assert!(matches!(result, Err(Error::RuntimeUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = QueueConfig::new().with_event_capacity(0);
        let result = SequentialTaskQueue::<i32, String>::from_config(config);
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_new_queue_is_idle() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.stats(), QueueStats::default());
        assert_eq!(queue.name(), "default");
    }

    #[tokio::test]
    async fn test_submit_resolves_value() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        let handle = queue.submit(|| async { Ok(7) });
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_submit_ids_increase() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        let first = queue.submit(|| async { Ok(1) });
        let second = queue.submit(|| async { Ok(2) });
        assert!(first.id() < second.id());
    }

    #[tokio::test]
    async fn test_state_draining_until_loop_runs() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        let handle = queue.submit(|| async { Ok(1) });

        // The current-thread runtime has not polled the drain loop yet.
        assert_eq!(queue.state(), QueueState::Draining);
        assert_eq!(queue.pending(), 1);

        handle.await.unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[tokio::test]
    async fn test_panicking_task_reports_message() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        let handle = queue.submit(|| async { panic!("exploded") });
        match handle.await {
            Err(QueueError::Panicked { message }) => assert_eq!(message, "exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_during_invocation_reports_message() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        let handle = queue.submit(|| -> futures::future::Ready<std::result::Result<i32, String>> {
            panic!("{}", String::from("before first poll"))
        });
        match handle.await {
            Err(QueueError::Panicked { message }) => assert_eq!(message, "before first poll"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_stop_queue() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        drop(queue.submit(|| async { Ok(1) }));
        let handle = queue.submit(|| async { Ok(2) });
        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(queue.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_wait_idle_on_idle_queue_returns() {
        let queue = SequentialTaskQueue::<i32, String>::new().unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_runtime_shutdown_drops_pending() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let queue = SequentialTaskQueue::<i32, String>::with_handle(
            QueueConfig::default(),
            runtime.handle().clone(),
        )
        .unwrap();

        let mut events = queue.subscribe();
        let first = queue.submit(|| async { Ok(1) });
        let second = queue.submit(|| async { Ok(2) });
        drop(runtime);

        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.pending(), 0);

        let stats = queue.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.outstanding(), 0);

        let mut dropped = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let QueueEvent::Failed { task_id, kind } = event {
                assert_eq!(kind, FailureKind::Dropped);
                dropped.push(task_id);
            }
        }
        assert_eq!(dropped, vec![first.id(), second.id()]);

        assert!(matches!(futures::executor::block_on(first), Err(QueueError::Dropped)));
        assert!(matches!(futures::executor::block_on(second), Err(QueueError::Dropped)));
    }

    #[test]
    fn test_runtime_shutdown_mid_task_counts_running_entry() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let queue = SequentialTaskQueue::<i32, String>::with_handle(
            QueueConfig::default(),
            runtime.handle().clone(),
        )
        .unwrap();

        let mut events = queue.subscribe();
        let running = queue.submit(|| std::future::pending::<std::result::Result<i32, String>>());
        let waiting = queue.submit(|| async { Ok(2) });

        runtime.block_on(async {
            while let Ok(event) = events.recv().await {
                if matches!(event, QueueEvent::Started { .. }) {
                    break;
                }
            }
        });
        assert_eq!(queue.pending(), 1);
        drop(runtime);

        let stats = queue.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(queue.state(), QueueState::Idle);

        assert!(matches!(futures::executor::block_on(running), Err(QueueError::Dropped)));
        assert!(matches!(futures::executor::block_on(waiting), Err(QueueError::Dropped)));
    }

    #[test]
    fn test_panic_message_fallback() {
        let payload: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_message(payload.as_ref()), "task panicked");
    }

    #[test]
    fn test_queue_state_display() {
        assert_eq!(QueueState::Idle.to_string(), "idle");
        assert_eq!(QueueState::Draining.to_string(), "draining");
    }
}
