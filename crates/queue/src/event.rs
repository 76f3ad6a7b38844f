//! Lifecycle events broadcast by a queue.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::task::TaskId;

/// A queue lifecycle event.
///
/// Events for one queue are emitted in the order the transitions happen:
/// every `Started` is preceded by its `Submitted`, and a task's `Succeeded`
/// or `Failed` comes before the next task's `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A task was appended to the pending sequence.
    Submitted { task_id: TaskId },
    /// The queue left the idle state and started a drain loop.
    Draining,
    /// A task was removed from the head and invoked.
    Started { task_id: TaskId },
    /// A task completed with a value.
    Succeeded { task_id: TaskId },
    /// A task completed with a failure.
    Failed { task_id: TaskId, kind: FailureKind },
    /// The pending sequence is exhausted and the drain loop stopped.
    Idle,
}

impl QueueEvent {
    /// Task this event refers to, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Submitted { task_id }
            | Self::Started { task_id }
            | Self::Succeeded { task_id }
            | Self::Failed { task_id, .. } => Some(*task_id),
            Self::Draining | Self::Idle => None,
        }
    }

    /// Short event name, as used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Draining => "draining",
            Self::Started { .. } => "started",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Idle => "idle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_extraction() {
        let id = TaskId::new(4);
        assert_eq!(QueueEvent::Started { task_id: id }.task_id(), Some(id));
        assert_eq!(
            QueueEvent::Failed {
                task_id: id,
                kind: FailureKind::Task
            }
            .task_id(),
            Some(id)
        );
        assert_eq!(QueueEvent::Idle.task_id(), None);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(QueueEvent::Draining.name(), "draining");
        assert_eq!(
            QueueEvent::Submitted {
                task_id: TaskId::new(1)
            }
            .name(),
            "submitted"
        );
    }
}
