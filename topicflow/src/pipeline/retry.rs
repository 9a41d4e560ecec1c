//! Bounded retry with a configurable wait policy between attempts.
//!
//! [`retry`] never returns early with an error: it runs the operation until
//! it succeeds or the attempt budget is spent, and hands back the result of
//! the last attempt. Deciding whether a failure is worth retrying at all is
//! the caller's job.

use crate::events::LogSink;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base (constant)
    #[default]
    Constant,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base * 2^attempt
    Exponential,
}

/// Jitter strategy applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Explicit per-attempt delays in milliseconds. When non-empty it
    /// replaces backoff and jitter; the last entry repeats.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule_ms: Vec<u64>,
}

const fn default_max_attempts() -> usize {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
            schedule_ms: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with `attempts` tries spaced by a fixed delay.
    #[must_use]
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self::new()
            .with_max_attempts(attempts)
            .with_base_delay_ms(millis)
            .with_max_delay_ms(millis)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Sets an explicit per-attempt delay schedule.
    #[must_use]
    pub fn with_schedule_ms(mut self, schedule: Vec<u64>) -> Self {
        self.schedule_ms = schedule;
        self
    }

    /// Attempt budget actually used.
    #[must_use]
    pub fn effective_attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the failed attempt with 0-based index `retry_index`.
    #[must_use]
    pub fn delay_for(&self, retry_index: usize) -> Duration {
        if let Some(last) = self.schedule_ms.last() {
            let millis = self.schedule_ms.get(retry_index).unwrap_or(last);
            return Duration::from_millis(*millis);
        }

        let base = self.base_delay_ms;
        let max = self.max_delay_ms;
        let exponent = u32::try_from(retry_index).unwrap_or(u32::MAX);

        let delay = match self.backoff {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base.saturating_mul(retry_index as u64 + 1),
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(exponent)),
        }
        .min(max);

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Result of a retried operation together with the attempts it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T, E> {
    /// Result of the last attempt made.
    pub result: Result<T, E>,
    /// Number of attempts made (at least one).
    pub attempts: usize,
}

impl<T, E> Retried<T, E> {
    /// Returns true if an attempt succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Discards the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Runs `operation` up to the policy's attempt budget.
///
/// The closure receives the 1-based attempt number. The first success is
/// returned immediately; otherwise the error of the final attempt is
/// returned. Waits between attempts are cooperative sleeps, and there is no
/// wait after the final attempt.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    sink: &dyn LogSink,
    mut operation: F,
) -> Retried<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.effective_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if attempt >= max_attempts => {
                sink.warn(&format!(
                    "[{label}] giving up after {attempt}/{max_attempts} attempts: {e}"
                ));
                return Retried {
                    result: Err(e),
                    attempts: attempt,
                };
            }
            Err(e) => {
                let delay = policy.delay_for(attempt - 1);
                tracing::debug!(
                    label,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after error"
                );
                sink.warn(&format!(
                    "[{label}] attempt {attempt}/{max_attempts} failed: {e}; retrying in {}ms",
                    delay.as_millis()
                ));
                tokio::time::sleep(delay).await;
            }
        }
    }
}
