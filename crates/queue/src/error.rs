//! Error types for queued tasks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type delivered to a task's outcome handle.
pub type QueueResult<T, E> = Result<T, QueueError<E>>;

/// Reason a submitted value could not be invoked as a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct InvalidTask {
    reason: String,
}

impl InvalidTask {
    /// Create a new invalid-task reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Failure delivered to a single task's outcome handle.
///
/// None of these variants are fatal to the queue: the entry is reported and
/// draining continues with the next entry.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The task's operation failed. Carries the error unchanged.
    #[error("task failed: {0}")]
    Task(E),

    /// The submitted value could not be invoked as an operation.
    #[error("invalid task: {reason}")]
    InvalidTask { reason: String },

    /// The task panicked while being invoked or polled.
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// The entry was discarded before it produced a result.
    #[error("task was dropped before it completed")]
    Dropped,
}

impl<E> QueueError<E> {
    /// Create a panicked error.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }

    /// Classify this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Task(_) => FailureKind::Task,
            Self::InvalidTask { .. } => FailureKind::InvalidTask,
            Self::Panicked { .. } => FailureKind::Panicked,
            Self::Dropped => FailureKind::Dropped,
        }
    }

    /// Check if the task itself reported the failure.
    #[must_use]
    pub const fn is_task_failure(&self) -> bool {
        matches!(self, Self::Task(_))
    }

    /// Borrow the task's own error, if this is a task failure.
    #[must_use]
    pub const fn task_error(&self) -> Option<&E> {
        match self {
            Self::Task(e) => Some(e),
            _ => None,
        }
    }

    /// Take the task's own error, if this is a task failure.
    pub fn into_task_error(self) -> Option<E> {
        match self {
            Self::Task(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<InvalidTask> for QueueError<E> {
    fn from(invalid: InvalidTask) -> Self {
        Self::InvalidTask {
            reason: invalid.reason,
        }
    }
}

/// Coarse classification of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation returned an error.
    Task,
    /// The operation could not be invoked.
    InvalidTask,
    /// The operation panicked.
    Panicked,
    /// The entry was discarded.
    Dropped,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task_failure"),
            Self::InvalidTask => write!(f, "invalid_task"),
            Self::Panicked => write!(f, "panicked"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}
