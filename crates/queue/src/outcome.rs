//! Per-submission outcome handles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{QueueError, QueueResult};
use crate::task::TaskId;

/// Eventual result of one submitted task.
///
/// Resolves exactly once, with this task's own value or failure. Dropping the
/// handle does not cancel the task; the queue still runs it in order and
/// discards the result.
pub struct OutcomeHandle<T, E> {
    id: TaskId,
    receiver: oneshot::Receiver<QueueResult<T, E>>,
}

impl<T, E> OutcomeHandle<T, E> {
    pub(crate) const fn new(id: TaskId, receiver: oneshot::Receiver<QueueResult<T, E>>) -> Self {
        Self { id, receiver }
    }

    /// Identifier of the submission this handle belongs to.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Take the outcome if the task has already finished.
    ///
    /// Returns `None` while the task is still pending or running.
    pub fn try_outcome(&mut self) -> Option<QueueResult<T, E>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(QueueError::Dropped)),
        }
    }
}

impl<T, E> Future for OutcomeHandle<T, E> {
    type Output = QueueResult<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::Dropped)))
    }
}

impl<T, E> fmt::Debug for OutcomeHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel();
        let handle: OutcomeHandle<i32, String> = OutcomeHandle::new(TaskId::new(1), rx);
        tx.send(Ok(5)).unwrap();
        assert_eq!(handle.await.ok(), Some(5));
    }

    #[tokio::test]
    async fn test_dropped_sender_yields_dropped() {
        let (tx, rx) = oneshot::channel::<QueueResult<i32, String>>();
        let handle = OutcomeHandle::new(TaskId::new(1), rx);
        drop(tx);
        assert!(matches!(handle.await, Err(QueueError::Dropped)));
    }

    #[test]
    fn test_try_outcome_pending_then_ready() {
        let (tx, rx) = oneshot::channel::<QueueResult<i32, String>>();
        let mut handle = OutcomeHandle::new(TaskId::new(3), rx);
        assert!(handle.try_outcome().is_none());
        tx.send(Err(QueueError::Task("bad".to_string()))).unwrap();
        let outcome = handle.try_outcome();
        assert!(matches!(outcome, Some(Err(QueueError::Task(ref e))) if e == "bad"));
    }

    #[test]
    fn test_debug_shows_id() {
        let (_tx, rx) = oneshot::channel::<QueueResult<i32, String>>();
        let handle = OutcomeHandle::new(TaskId::new(9), rx);
        assert!(format!("{handle:?}").contains('9'));
    }
}
