//! Adaptive call admission for a single key.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskforce_config::SchedulerSettings;

use crate::classify::{CallError, CallFailure, DefaultOverloadClassifier, OverloadClassifier};
use crate::policy::{BackoffPolicy, RetryPolicy};

/// Timing and attempt accounting for one settled call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    pub key: String,
    pub attempts: u32,
    pub queue_wait_ms: u64,
    pub scheduler_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub overload_count: u32,
    pub succeeded: bool,
}

/// Per-call options.
#[derive(Default)]
pub struct RunOptions {
    /// Cancels the call while queued, spacing, running or backing off.
    pub cancel: Option<CancellationToken>,
    /// Invoked once with the final metrics, success or failure.
    pub on_settled: Option<Box<dyn FnOnce(&RunMetrics) + Send>>,
}

impl RunOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn on_settled(mut self, f: impl FnOnce(&RunMetrics) + Send + 'static) -> Self {
        self.on_settled = Some(Box::new(f));
        self
    }
}

/// Point-in-time view of a key's admission state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub key: String,
    pub active: usize,
    pub queued: usize,
    pub current_parallel_limit: usize,
    pub max_parallel_requests: usize,
    pub consecutive_successes: u32,
}

struct KeyState {
    active: usize,
    limit: usize,
    consecutive_successes: u32,
    queue: VecDeque<oneshot::Sender<Permit>>,
}

/// Admission bookkeeping shared with outstanding permits.
struct Admission {
    key: String,
    state: Mutex<KeyState>,
}

impl Admission {
    /// Grant permits, oldest first, while below the current limit.
    fn drain(self: &Arc<Self>) {
        let mut state = self.state.lock();
        while state.active < state.limit {
            let Some(tx) = state.queue.pop_front() else {
                break;
            };
            let permit = Permit {
                admission: Some(Arc::clone(self)),
            };
            match tx.send(permit) {
                Ok(()) => {
                    state.active += 1;
                    debug!(
                        "Admitted call on '{}' (active={}, limit={}, queued={})",
                        self.key,
                        state.active,
                        state.limit,
                        state.queue.len()
                    );
                }
                // The waiter was cancelled and never counted.
                Err(permit) => permit.disarm(),
            }
        }
    }

    fn release(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
        }
        self.drain();
    }
}

/// One admission slot. Dropping it frees the slot, including when it is
/// dropped undelivered inside the grant channel of an abandoned waiter.
struct Permit {
    admission: Option<Arc<Admission>>,
}

impl Permit {
    fn disarm(mut self) {
        self.admission = None;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            admission.release();
        }
    }
}

/// FIFO admission queue with an adaptive parallelism limit.
pub struct CallScheduler {
    settings: SchedulerSettings,
    admission: Arc<Admission>,
    last_start: tokio::sync::Mutex<Option<Instant>>,
    retry_policy: Arc<dyn RetryPolicy>,
    classifier: Arc<dyn OverloadClassifier>,
}

impl CallScheduler {
    /// Create a scheduler with exponential backoff and the default classifier.
    pub fn new(key: impl Into<String>, settings: SchedulerSettings) -> Self {
        Self::with_policies(
            key,
            settings,
            Arc::new(BackoffPolicy::default()),
            Arc::new(DefaultOverloadClassifier),
        )
    }

    pub fn with_policies(
        key: impl Into<String>,
        settings: SchedulerSettings,
        retry_policy: Arc<dyn RetryPolicy>,
        classifier: Arc<dyn OverloadClassifier>,
    ) -> Self {
        let max = settings.max_parallel_requests.max(1);
        let limit = settings.initial_parallel_requests.clamp(1, max);
        Self {
            settings,
            admission: Arc::new(Admission {
                key: key.into(),
                state: Mutex::new(KeyState {
                    active: 0,
                    limit,
                    consecutive_successes: 0,
                    queue: VecDeque::new(),
                }),
            }),
            last_start: tokio::sync::Mutex::new(None),
            retry_policy,
            classifier,
        }
    }

    pub fn key(&self) -> &str {
        &self.admission.key
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> SchedulerStats {
        let state = self.admission.state.lock();
        SchedulerStats {
            key: self.admission.key.clone(),
            active: state.active,
            queued: state.queue.len(),
            current_parallel_limit: state.limit,
            max_parallel_requests: self.settings.max_parallel_requests.max(1),
            consecutive_successes: state.consecutive_successes,
        }
    }

    /// Run one logical call through admission, spacing and retry.
    ///
    /// `f` is invoked once per attempt. The slot is held across retries.
    /// The last error is returned unchanged once retries are exhausted or the
    /// policy gives up.
    pub async fn run<F, Fut, T, E>(&self, mut f: F, options: RunOptions) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: CallError,
    {
        let RunOptions { cancel, on_settled } = options;
        let cancel = cancel.unwrap_or_default();
        let mut metrics = RunMetrics {
            key: self.key().to_string(),
            ..Default::default()
        };

        let enqueued = Instant::now();
        let permit = match self.admit(&cancel).await {
            Some(permit) => permit,
            None => {
                metrics.queue_wait_ms = millis(enqueued.elapsed());
                settle(on_settled, &metrics);
                return Err(E::cancelled());
            }
        };
        metrics.queue_wait_ms = millis(enqueued.elapsed());

        let max_attempts = self.settings.max_attempts.max(1);
        let result = loop {
            metrics.attempts += 1;
            let attempt = metrics.attempts;

            let spaced = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(E::cancelled()),
                waited = self.space_start() => waited,
            };
            metrics.scheduler_delay_ms += millis(spaced);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(E::cancelled()),
                outcome = f() => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    self.record_success();
                    break Ok(value);
                }
                Err(err) => err,
            };

            if cancel.is_cancelled() {
                break Err(err);
            }

            let mut failure = CallFailure::from_error(&err, attempt);
            failure.overload = self.classifier.is_overload(&failure);
            if failure.overload {
                metrics.overload_count += 1;
                self.record_overload();
            }

            if attempt >= max_attempts {
                warn!(
                    "Call on '{}' failed after {} attempts: {}",
                    self.key(), attempt, failure.message
                );
                break Err(err);
            }

            let Some(delay) = self.retry_policy.next_delay(attempt, &failure) else {
                debug!(
                    "Call on '{}' not retried (attempt {}): {}",
                    self.key(), attempt, failure.message
                );
                break Err(err);
            };

            warn!(
                "Call on '{}' failed (attempt {}/{}): {}, retrying in {:?}",
                self.key(), attempt, max_attempts, failure.message, delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(E::cancelled()),
                _ = sleep(delay) => {}
            }
            metrics.retry_delay_ms += millis(delay);
        };

        drop(permit);
        metrics.succeeded = result.is_ok();
        settle(on_settled, &metrics);
        result
    }

    /// Wait for an admission permit; `None` if cancelled first.
    async fn admit(&self, cancel: &CancellationToken) -> Option<Permit> {
        let (tx, rx) = oneshot::channel();
        self.admission.state.lock().queue.push_back(tx);
        self.admission.drain();

        tokio::select! {
            biased;
            // Dropping `rx` also drops a permit that raced the cancellation.
            _ = cancel.cancelled() => None,
            granted = rx => granted.ok(),
        }
    }

    /// Enforce the minimum start interval, then sleep a random jitter.
    async fn space_start(&self) -> Duration {
        let began = Instant::now();
        {
            let mut last = self.last_start.lock().await;
            if let Some(prev) = *last {
                let min = Duration::from_millis(self.settings.min_interval_between_start_ms);
                let elapsed = prev.elapsed();
                if elapsed < min {
                    sleep(min - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let jitter = self.settings.start_jitter_ms;
        if jitter > 0 {
            let ms = rand::thread_rng().gen_range(0..=jitter);
            sleep(Duration::from_millis(ms)).await;
        }
        began.elapsed()
    }

    fn record_overload(&self) {
        let mut state = self.admission.state.lock();
        let before = state.limit;
        state.limit = (state.limit / 2).max(1);
        state.consecutive_successes = 0;
        if state.limit != before {
            info!(
                "Overload on '{}': parallel limit {} -> {}",
                self.key(), before, state.limit
            );
        }
    }

    fn record_success(&self) {
        let max = self.settings.max_parallel_requests.max(1);
        let threshold = self.settings.increase_after_consecutive_successes.max(1);
        let raised = {
            let mut state = self.admission.state.lock();
            state.consecutive_successes += 1;
            if state.consecutive_successes >= threshold {
                state.consecutive_successes = 0;
                if state.limit < max {
                    state.limit += 1;
                    info!("Parallel limit on '{}' raised to {}", self.key(), state.limit);
                    true
                } else {
                    false
                }
            } else {
                false
            }
        };
        if raised {
            self.admission.drain();
        }
    }
}

fn settle(on_settled: Option<Box<dyn FnOnce(&RunMetrics) + Send>>, metrics: &RunMetrics) {
    if let Some(callback) = on_settled {
        callback(metrics);
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
