//! Runs a [`Plan`] through a sequential task queue and reports the outcomes.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info};

use ordo_core::{Result, ResultExt};
use ordo_queue::{
    FailureKind, IntoTask, InvalidTask, QueueError, QueueResult, QueueStats, RetryPolicy,
    SequentialTaskQueue, TaskFuture, TaskId, retry, with_timeout,
};

use crate::plan::{Plan, TaskKind, TaskSpec};

/// Final status of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Produced a value.
    Succeeded,
    /// The task's own operation failed.
    Failed,
    /// The task could not be invoked.
    Invalid,
    /// The task panicked.
    Panicked,
    /// The task was discarded without a result.
    Dropped,
}

impl From<FailureKind> for TaskStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Task => Self::Failed,
            FailureKind::InvalidTask => Self::Invalid,
            FailureKind::Panicked => Self::Panicked,
            FailureKind::Dropped => Self::Dropped,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Invalid => write!(f, "invalid"),
            Self::Panicked => write!(f, "panicked"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

/// Outcome of one task, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Task name from the plan.
    pub name: String,
    /// Queue-assigned identifier.
    pub task_id: TaskId,
    /// 1-based position in the order tasks were started.
    pub started: Option<usize>,
    /// Final status.
    pub status: TaskStatus,
    /// Value, for succeeded tasks.
    pub value: Option<String>,
    /// Failure description, for everything else.
    pub error: Option<String>,
}

impl TaskReport {
    fn new(
        name: String,
        task_id: TaskId,
        started: Option<usize>,
        outcome: QueueResult<String, String>,
    ) -> Self {
        let (status, value, error) = match outcome {
            Ok(value) => (TaskStatus::Succeeded, Some(value), None),
            Err(QueueError::Task(reason)) => (TaskStatus::Failed, None, Some(reason)),
            Err(other) => (other.kind().into(), None, Some(other.to_string())),
        };

        Self {
            name,
            task_id,
            started,
            status,
            value,
            error,
        }
    }
}

/// Report for a whole plan run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Queue name.
    pub queue: String,
    /// One entry per task, in submission order.
    pub tasks: Vec<TaskReport>,
    /// Queue counters after the run.
    pub stats: QueueStats,
    /// Wall time for the whole run.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Task names in the order the queue started them.
    #[must_use]
    pub fn start_order(&self) -> Vec<&str> {
        let mut started: Vec<(usize, &str)> = self
            .tasks
            .iter()
            .filter_map(|t| t.started.map(|position| (position, t.name.as_str())))
            .collect();
        started.sort_unstable_by_key(|(position, _)| *position);
        started.into_iter().map(|(_, name)| name).collect()
    }

    /// Look up a task report by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Whether every task succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Succeeded)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "queue '{}': {} tasks, {} succeeded, {} failed in {}ms",
            self.queue,
            self.stats.submitted,
            self.stats.succeeded,
            self.stats.failed,
            self.elapsed_ms
        )?;

        for task in &self.tasks {
            let started = task
                .started
                .map_or_else(|| "-".to_string(), |position| position.to_string());
            let detail = task
                .value
                .as_deref()
                .or(task.error.as_deref())
                .unwrap_or_default();
            writeln!(
                f,
                "  {:>3}  {:<16} {:<10} {}",
                started, task.name, task.status, detail
            )?;
        }

        Ok(())
    }
}

/// Submit every task of the plan, in order, and wait for all outcomes.
///
/// # Errors
///
/// Returns error if the queue cannot be created. Task failures are part of
/// the report, not errors.
pub async fn run_plan(plan: &Plan) -> Result<RunReport> {
    let queue = SequentialTaskQueue::<String, String>::from_config(plan.queue.clone())
        .inspect_error(|e| error!(queue = %plan.queue.name, error = %e, "failed to create queue"))?;
    let start_log = Arc::new(StartLog::default());
    let started_at = Instant::now();

    info!(queue = %queue.name(), tasks = plan.tasks.len(), "running plan");

    let submitted: Vec<_> = plan
        .tasks
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let task = Tracked {
                index,
                log: Arc::clone(&start_log),
                task: build_task(spec.clone()),
            };
            (spec.name.clone(), queue.submit(task))
        })
        .collect();

    let outcomes = join_all(submitted.into_iter().map(|(name, handle)| async move {
        let id = handle.id();
        (name, id, handle.await)
    }))
    .await;
    queue.wait_idle().await;

    let positions = start_log.positions(plan.tasks.len());
    let tasks = outcomes
        .into_iter()
        .zip(positions)
        .map(|((name, id, outcome), started)| TaskReport::new(name, id, started, outcome))
        .collect();

    let report = RunReport {
        queue: queue.name().to_string(),
        tasks,
        stats: queue.stats(),
        elapsed_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    info!(
        queue = %report.queue,
        succeeded = report.stats.succeeded,
        failed = report.stats.failed,
        elapsed_ms = report.elapsed_ms,
        "plan finished"
    );

    Ok(report)
}

/// Turn a task spec into a queue task. Unknown kinds yield `None`, which the
/// queue rejects as an invalid task when it reaches it.
fn build_task(
    spec: TaskSpec,
) -> Option<impl FnOnce() -> BoxFuture<'static, std::result::Result<String, String>> + Send + 'static>
{
    let Some(kind) = spec.parsed_kind() else {
        debug!(task = %spec.name, "submitting task with unknown kind");
        return None;
    };

    Some(move || run_task(kind, spec).boxed())
}

async fn run_task(kind: TaskKind, spec: TaskSpec) -> std::result::Result<String, String> {
    let policy = spec.retry.unwrap_or_else(RetryPolicy::once);
    let spec_ref = &spec;
    let attempts = retry(policy, move |attempt| run_attempt(kind, spec_ref, attempt));

    match spec.timeout_ms {
        Some(ms) => with_timeout(Duration::from_millis(ms), attempts)
            .await
            .map_err(|e| e.to_string()),
        None => attempts.await,
    }
}

async fn run_attempt(
    kind: TaskKind,
    spec: &TaskSpec,
    attempt: u32,
) -> std::result::Result<String, String> {
    if spec.delay_ms > 0 {
        sleep(Duration::from_millis(spec.delay_ms)).await;
    }

    let value = || spec.value.clone().unwrap_or_else(|| spec.name.clone());

    match kind {
        TaskKind::Succeed => Ok(value()),
        TaskKind::Fail => Err(spec
            .reason
            .clone()
            .unwrap_or_else(|| format!("{} failed", spec.name))),
        TaskKind::Flaky if attempt < spec.failures => Err(format!(
            "{} failed on attempt {}",
            spec.name,
            attempt.saturating_add(1)
        )),
        TaskKind::Flaky => Ok(value()),
    }
}

/// Submission indices in the order the queue invoked them.
#[derive(Debug, Default)]
struct StartLog(Mutex<Vec<usize>>);

impl StartLog {
    fn record(&self, index: usize) {
        self.0.lock().push(index);
    }

    /// 1-based start position per submission index.
    fn positions(&self, count: usize) -> Vec<Option<usize>> {
        let mut positions = vec![None; count];
        for (order, index) in self.0.lock().iter().enumerate() {
            if let Some(slot) = positions.get_mut(*index) {
                *slot = Some(order.saturating_add(1));
            }
        }
        positions
    }
}

/// Records when the queue reaches a task, including tasks it then rejects.
struct Tracked<K> {
    index: usize,
    log: Arc<StartLog>,
    task: K,
}

impl<K> IntoTask<String, String> for Tracked<K>
where
    K: IntoTask<String, String>,
{
    fn invoke(self) -> std::result::Result<TaskFuture<String, String>, InvalidTask> {
        self.log.record(self.index);
        self.task.invoke()
    }
}
