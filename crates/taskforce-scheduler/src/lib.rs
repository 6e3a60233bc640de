//! # Taskforce Scheduler
//!
//! Adaptive call admission for rate-limited backends.
//!
//! Each admission key (normally a model id) gets its own [`CallScheduler`]
//! with a FIFO queue and a parallelism limit that halves on overload and
//! creeps back up after a run of clean completions. Attempts are spaced out
//! and jittered, and failed attempts are retried according to a
//! [`RetryPolicy`].
//!
//! [`SchedulerRegistry`] owns one scheduler per key and
//! [`ScheduledProvider`] routes provider calls through it.

mod classify;
mod policy;
mod provider;
mod registry;
mod scheduler;

pub use classify::{CallError, CallFailure, DefaultOverloadClassifier, OverloadClassifier};
pub use policy::{BackoffPolicy, NoRetry, RetryPolicy};
pub use provider::ScheduledProvider;
pub use registry::{normalize_key, SchedulerRegistry, DEFAULT_KEY};
pub use scheduler::{CallScheduler, RunMetrics, RunOptions, SchedulerStats};
