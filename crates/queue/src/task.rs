//! Task identity and the conversion of submitted values into runnable futures.

use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::InvalidTask;

/// A started task: the boxed future the drain loop awaits.
pub type TaskFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Identifier assigned to every submission, unique within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A value that can be submitted to a [`SequentialTaskQueue`](crate::SequentialTaskQueue).
///
/// Any `FnOnce() -> impl Future<Output = Result<T, E>>` closure is a task.
/// `Option<F>` is accepted as well; `None` stands for a value that cannot be
/// invoked and is rejected with [`QueueError::InvalidTask`](crate::QueueError::InvalidTask)
/// when the queue reaches it.
pub trait IntoTask<T, E>: Send + 'static {
    /// Invoke the operation, producing the future to await.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTask`] if the value does not describe a runnable operation.
    fn invoke(self) -> Result<TaskFuture<T, E>, InvalidTask>;
}

impl<F, Fut, T, E> IntoTask<T, E> for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn invoke(self) -> Result<TaskFuture<T, E>, InvalidTask> {
        Ok(self().boxed())
    }
}

impl<F, T, E> IntoTask<T, E> for Option<F>
where
    F: IntoTask<T, E>,
{
    fn invoke(self) -> Result<TaskFuture<T, E>, InvalidTask> {
        self.ok_or_else(|| InvalidTask::new("no operation was supplied"))?
            .invoke()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::new(7).to_string(), "task-7");
        assert_eq!(TaskId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_task_id_ordering_follows_submission() {
        assert!(TaskId::new(1) < TaskId::new(2));
    }

    #[tokio::test]
    async fn test_closure_invokes() {
        let task = || async { Ok::<_, String>(42) };
        let future = IntoTask::<i32, String>::invoke(task).unwrap();
        assert_eq!(future.await, Ok(42));
    }

    #[test]
    fn test_none_is_invalid() {
        let task: Option<fn() -> futures::future::Ready<Result<i32, String>>> = None;
        match IntoTask::<i32, String>::invoke(task) {
            Err(invalid) => assert_eq!(invalid.reason(), "no operation was supplied"),
            Ok(_) => panic!("None must not be invokable"),
        }
    }

    #[tokio::test]
    async fn test_some_delegates() {
        let task = Some(|| async { Err::<i32, _>("nope".to_string()) });
        let future = IntoTask::<i32, String>::invoke(task).unwrap();
        assert_eq!(future.await, Err("nope".to_string()));
    }
}
