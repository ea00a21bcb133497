//! Bounded retry with a fixed or exponential delay.
//!
//! The remote loader wraps its whole inject → container → resolve pipeline
//! in [`retry`]. Every attempt goes back through the keyed caches of the
//! lower layers, so an attempt after a partial success only repeats the
//! stage that failed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for retry behavior.
///
/// `max_attempts` counts *total* tries, including the first one. With the
/// default `backoff_factor` of `1.0` every retry waits exactly `delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of tries (values below 1 are treated as 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry (`1.0` = fixed delay).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_backoff_factor() -> f64 {
    1.0
}

impl RetryPolicy {
    /// Creates a fixed-delay policy.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            max_delay: delay,
            backoff_factor: 1.0,
        }
    }

    /// Creates a policy that tries exactly once.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Switches to exponential backoff capped at `max_delay`.
    #[must_use]
    pub fn with_backoff(mut self, factor: f64, max_delay: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_delay = max_delay;
        self
    }

    /// Total tries this policy allows, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait before the given attempt (0-indexed).
    ///
    /// Returns `Duration::ZERO` for attempt 0.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        if self.backoff_factor <= 1.0 {
            return self.delay;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_ms = self.delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let cap_ms = self.max_delay.max(self.delay).as_millis() as f64;

        Duration::from_millis(base_ms.min(cap_ms).max(0.0) as u64)
    }

    /// Whether another try is allowed after `completed` tries.
    #[must_use]
    pub fn should_retry(&self, completed: u32) -> bool {
        completed < self.attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(1, Duration::from_millis(1000))
    }
}

/// Result of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed on every allowed try.
    Exhausted {
        /// The error of the final try, unchanged.
        error: E,
        /// Number of tries made.
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Returns true if the operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts to a `Result`, dropping the attempt count.
    #[allow(clippy::missing_errors_doc)]
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Exhausted { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation under a [`RetryPolicy`].
///
/// `operation` receives the 0-indexed attempt number. `should_retry` sees
/// each error and may stop early by returning `false`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use fedload_core::retry::{RetryPolicy, retry};
///
/// # async fn example() {
/// let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
/// let outcome = retry(&policy, |_attempt| async move {
///     Ok::<_, String>("loaded".to_string())
/// }, |_err| true).await;
/// assert!(outcome.is_success());
/// # }
/// ```
pub async fn retry<T, E, Fut, F, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(error) => {
                let completed = attempt.saturating_add(1);
                if !policy.should_retry(completed) || !should_retry(&error) {
                    return RetryOutcome::Exhausted {
                        error,
                        attempts: completed,
                    };
                }

                attempt = completed;
                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    attempt = attempt.saturating_add(1),
                    max_attempts = policy.attempts(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
            },
        }
    }
}
