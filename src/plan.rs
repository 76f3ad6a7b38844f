//! Task plans: TOML descriptions of tasks to push through a queue.
//!
//! ```toml
//! [queue]
//! name = "demo"
//!
//! [[task]]
//! name = "download"
//! kind = "succeed"
//! delay_ms = 300
//! value = "archive.tar"
//!
//! [[task]]
//! name = "flaky-upload"
//! kind = "flaky"
//! failures = 2
//! timeout_ms = 5000
//! retry = { max_attempts = 3, base_backoff_ms = 50 }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ordo_core::{Error, Result, ResultExt};
use ordo_queue::{QueueConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// A plan: queue settings plus tasks in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Tasks, submitted in file order.
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskSpec>,
}

/// One task in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Display name.
    pub name: String,

    /// Behaviour of the task, see [`TaskKind`]. Unknown kinds are kept and
    /// reported as invalid tasks at run time.
    pub kind: String,

    /// Simulated work duration per attempt.
    #[serde(default)]
    pub delay_ms: u64,

    /// Value produced on success (defaults to the task name).
    #[serde(default)]
    pub value: Option<String>,

    /// Failure reason for `fail` tasks.
    #[serde(default)]
    pub reason: Option<String>,

    /// Number of failing attempts before a `flaky` task succeeds.
    #[serde(default)]
    pub failures: u32,

    /// Deadline for the whole task, including retries.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Retry policy applied inside the task.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

impl TaskSpec {
    /// Create a task spec with no delay, value, timeout or retries.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            delay_ms: 0,
            value: None,
            reason: None,
            failures: 0,
            timeout_ms: None,
            retry: None,
        }
    }

    /// Set the simulated duration.
    #[must_use]
    pub const fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the success value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the failure reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Parsed kind, or `None` (logged) if the kind is not recognised.
    #[must_use]
    pub fn parsed_kind(&self) -> Option<TaskKind> {
        self.kind.parse().into_option_logged()
    }
}

/// Recognised task behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Sleep, then succeed with the value.
    Succeed,
    /// Sleep, then fail with the reason.
    Fail,
    /// Fail the first `failures` attempts, then succeed.
    Flaky,
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "succeed" => Ok(Self::Succeed),
            "fail" => Ok(Self::Fail),
            "flaky" => Ok(Self::Flaky),
            other => Err(Error::invalid_config(format!("unknown task kind '{other}'"))),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeed => write!(f, "succeed"),
            Self::Fail => write!(f, "fail"),
            Self::Flaky => write!(f, "flaky"),
        }
    }
}

impl Plan {
    /// Read, parse and validate a plan file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the plan is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a plan from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid TOML or the plan is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let plan: Self = toml::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Validate the plan.
    ///
    /// Unknown task kinds are not an error here; they surface per task when
    /// the plan runs.
    ///
    /// # Errors
    ///
    /// Returns error if the plan is invalid.
    pub fn validate(&self) -> Result<()> {
        self.queue.validate()?;

        if self.tasks.is_empty() {
            return Err(Error::invalid_config("plan contains no tasks"));
        }

        self.tasks.iter().try_for_each(|task| {
            if task.name.trim().is_empty() {
                return Err(Error::invalid_config("task name must not be empty"));
            }
            task.retry.as_ref().map_or(Ok(()), RetryPolicy::validate)
        })
    }

    /// The built-in demonstration plan.
    ///
    /// A slow, a fast and a medium task (which still finish in submission
    /// order), a failing task, a task with an unknown kind, and a flaky task
    /// that succeeds on its third attempt.
    #[must_use]
    pub fn demo() -> Self {
        let mut flaky = TaskSpec::new("flaky", "flaky")
            .with_delay_ms(50)
            .with_value("third time lucky");
        flaky.failures = 2;
        flaky.timeout_ms = Some(2_000);
        flaky.retry = Some(RetryPolicy::new(3).with_backoff(100, 1_000));

        Self {
            queue: QueueConfig::new().with_name("demo"),
            tasks: vec![
                TaskSpec::new("T1", "succeed")
                    .with_delay_ms(300)
                    .with_value("T1-result"),
                TaskSpec::new("T2", "succeed")
                    .with_delay_ms(100)
                    .with_value("T2-result"),
                TaskSpec::new("T3", "succeed")
                    .with_delay_ms(200)
                    .with_value("T3-result"),
                TaskSpec::new("broken", "fail")
                    .with_delay_ms(50)
                    .with_reason("simulated failure"),
                TaskSpec::new("mystery", "teleport"),
                flaky,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
[queue]
name = "sample"

[[task]]
name = "first"
kind = "succeed"
delay_ms = 300
value = "one"

[[task]]
name = "second"
kind = "fail"
reason = "disk full"

[[task]]
name = "third"
kind = "flaky"
failures = 1
timeout_ms = 1000
retry = { max_attempts = 2 }
"#;

    #[test]
    fn test_parse_sample_plan() {
        let plan = Plan::from_toml_str(SAMPLE).unwrap();
        assert_eq!(plan.queue.name, "sample");
        assert_eq!(plan.tasks.len(), 3);

        let first = &plan.tasks[0];
        assert_eq!(first.name, "first");
        assert_eq!(first.parsed_kind(), Some(TaskKind::Succeed));
        assert_eq!(first.delay_ms, 300);
        assert_eq!(first.value.as_deref(), Some("one"));

        let third = &plan.tasks[2];
        assert_eq!(third.failures, 1);
        assert_eq!(third.timeout_ms, Some(1000));
        let retry = third.retry.unwrap();
        assert_eq!(retry.max_attempts, 2);
        assert_eq!(retry.base_backoff_ms, 100);
    }

    #[test]
    fn test_queue_table_is_optional() {
        let plan = Plan::from_toml_str("[[task]]\nname = \"only\"\nkind = \"succeed\"\n").unwrap();
        assert_eq!(plan.queue, QueueConfig::default());
        assert_eq!(plan.tasks[0].delay_ms, 0);
    }

    #[test]
    fn test_unknown_kind_is_accepted_at_load_time() {
        let plan = Plan::from_toml_str("[[task]]\nname = \"odd\"\nkind = \"teleport\"\n").unwrap();
        assert_eq!(plan.tasks[0].parsed_kind(), None);
    }

    #[test]
    fn test_empty_plan_rejected() {
        let result = Plan::from_toml_str("[queue]\nname = \"empty\"\n");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_blank_task_name_rejected() {
        let result = Plan::from_toml_str("[[task]]\nname = \"\"\nkind = \"succeed\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_retry_rejected() {
        let text = "[[task]]\nname = \"x\"\nkind = \"flaky\"\nretry = { max_attempts = 0 }\n";
        assert!(matches!(Plan::from_toml_str(text), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_missing_kind_is_parse_error() {
        let result = Plan::from_toml_str("[[task]]\nname = \"x\"\n");
        assert!(matches!(result, Err(Error::TomlParseFailed { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let plan = Plan::load(file.path()).unwrap();
        assert_eq!(plan.tasks.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Plan::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_demo_plan_is_valid() {
        let plan = Plan::demo();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.tasks[0].name, "T1");
        assert_eq!(plan.tasks[4].parsed_kind(), None);
    }

    #[test]
    fn test_task_kind_round_trip_names() {
        for kind in [TaskKind::Succeed, TaskKind::Fail, TaskKind::Flaky] {
            assert_eq!(kind.to_string().parse::<TaskKind>(), Ok(kind));
        }
        assert!(matches!(
            "sleep".parse::<TaskKind>(),
            Err(Error::InvalidConfig { reason }) if reason.contains("'sleep'")
        ));
    }
}
