//! Timeout and retry helpers for use inside submitted tasks.
//!
//! The queue never times out or retries a task itself. A task that needs a
//! deadline or retries wraps its own operation with these helpers, e.g.
//!
//! ```ignore
//! queue.submit(move || async move {
//!     with_timeout(Duration::from_secs(2), retry(policy, |_| fetch(&url))).await
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use ordo_core::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Error from [`with_timeout`].
#[derive(Debug, Error)]
pub enum TimeoutError<E> {
    /// The operation did not finish within the limit.
    #[error("operation timed out after {}ms", .0.as_millis())]
    Elapsed(Duration),

    /// The operation finished in time but failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Check if the deadline was hit.
    #[must_use]
    pub const fn is_elapsed(&self) -> bool {
        matches!(self, Self::Elapsed(_))
    }
}

/// Race an operation against a deadline.
///
/// # Errors
///
/// Returns [`TimeoutError::Elapsed`] if `limit` passes first, or
/// [`TimeoutError::Inner`] with the operation's own error.
pub async fn with_timeout<F, T, E>(limit: Duration, operation: F) -> std::result::Result<T, TimeoutError<E>>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result.map_err(TimeoutError::Inner),
        Err(_) => Err(TimeoutError::Elapsed(limit)),
    }
}

/// Retry policy with capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff duration in milliseconds.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given number of attempts and default backoff.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that runs the operation exactly once.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1)
    }

    /// Set the backoff bounds.
    #[must_use]
    pub const fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.base_backoff_ms = base_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Delay before the retry that follows failed attempt number `attempt` (0-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_backoff_ms, self.max_backoff_ms)
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns error if the policy is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ordo_core::Error::invalid_config("max_attempts must be greater than 0"));
        }

        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(ordo_core::Error::invalid_config(
                "base_backoff_ms must not exceed max_backoff_ms",
            ));
        }

        Ok(())
    }
}

/// Calculate exponential backoff duration.
#[must_use]
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let backoff = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(backoff.min(max_ms))
}

/// Run `make_attempt` until it succeeds or the policy's attempts are used up.
///
/// The attempt number (0-based) is passed to the factory. A policy with
/// `max_attempts == 0` still runs one attempt.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry<F, Fut, T, E>(policy: RetryPolicy, mut make_attempt: F) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match make_attempt(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let next = attempt.saturating_add(1);
                if next >= attempts {
                    return Err(e);
                }

                let delay = policy.backoff_for(attempt);
                debug!(
                    attempt = next,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = next;
            }
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}
