//! # ordo-queue
//!
//! Sequential FIFO execution of asynchronous tasks.
//!
//! - **Queue**: [`SequentialTaskQueue`] runs submitted tasks one at a time, in
//!   submission order, regardless of how long each one takes
//! - **Outcomes**: every submission gets its own [`OutcomeHandle`]; a failure
//!   reaches that handle only and never stops the queue
//! - **Events**: lifecycle events via [`SequentialTaskQueue::subscribe`]
//! - **Combinators**: [`with_timeout`] and [`retry`] for use inside tasks

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod combinators;
pub mod config;
pub mod error;
pub mod event;
pub mod outcome;
pub mod queue;
pub mod stats;
pub mod task;

pub use combinators::{RetryPolicy, TimeoutError, calculate_backoff, retry, with_timeout};
pub use config::QueueConfig;
pub use error::{FailureKind, InvalidTask, QueueError, QueueResult};
pub use event::QueueEvent;
pub use outcome::OutcomeHandle;
pub use queue::{QueueState, SequentialTaskQueue};
pub use stats::QueueStats;
pub use task::{IntoTask, TaskFuture, TaskId};
