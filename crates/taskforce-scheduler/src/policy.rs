//! Retry policies.

use std::time::Duration;

use taskforce_config::RetryConfig;

use crate::classify::CallFailure;

/// Decides whether, and after how long, a failed attempt is retried.
///
/// `None` means stop and surface the error.
pub trait RetryPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32, failure: &CallFailure) -> Option<Duration>;
}

impl<F> RetryPolicy for F
where
    F: Fn(u32, &CallFailure) -> Option<Duration> + Send + Sync,
{
    fn next_delay(&self, attempt: u32, failure: &CallFailure) -> Option<Duration> {
        self(attempt, failure)
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32, _failure: &CallFailure) -> Option<Duration> {
        None
    }
}

/// Exponential backoff that honours backend retry hints.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay after the `retry`-th retry (0-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let delay = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        let delay = delay.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.jitter {
            (delay + symmetric_jitter(delay * 0.1)).max(0.0) as u64
        } else {
            delay as u64
        };

        Duration::from_millis(delay_ms)
    }
}

impl RetryPolicy for BackoffPolicy {
    fn next_delay(&self, attempt: u32, failure: &CallFailure) -> Option<Duration> {
        if !failure.retryable && !failure.overload {
            return None;
        }
        Some(
            failure
                .retry_after
                .unwrap_or_else(|| self.delay_for_retry(attempt.saturating_sub(1))),
        )
    }
}

/// Uniform value in `[-max, max]`.
fn symmetric_jitter(max: f64) -> f64 {
    (rand::random::<f64>() * 2.0 - 1.0) * max
}
