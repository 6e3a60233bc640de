//! Call admission and retry configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::default_true;

/// Call admission defaults plus per-key overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hard ceiling on concurrent in-flight calls per key.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_requests: usize,

    /// Starting limit; defaults to `max_parallel_requests`.
    #[serde(default)]
    pub initial_parallel_requests: Option<usize>,

    /// Minimum spacing between two call starts on the same key.
    #[serde(default)]
    pub min_interval_between_start_ms: u64,

    /// Upper bound of the random delay added after spacing.
    #[serde(default = "default_jitter")]
    pub start_jitter_ms: u64,

    /// Non-overload completions needed before the limit grows by one.
    #[serde(default = "default_increase_after")]
    pub increase_after_consecutive_successes: u32,

    /// Total attempts per call, first attempt included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Overrides keyed by admission key (e.g. model id).
    #[serde(default)]
    pub keys: HashMap<String, SchedulerOverride>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel_requests: default_max_parallel(),
            initial_parallel_requests: None,
            min_interval_between_start_ms: 0,
            start_jitter_ms: default_jitter(),
            increase_after_consecutive_successes: default_increase_after(),
            max_attempts: default_max_attempts(),
            keys: HashMap::new(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

fn default_jitter() -> u64 {
    100
}

fn default_increase_after() -> u32 {
    8
}

fn default_max_attempts() -> u32 {
    4
}

/// Per-key override; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerOverride {
    pub max_parallel_requests: Option<usize>,
    pub initial_parallel_requests: Option<usize>,
    pub min_interval_between_start_ms: Option<u64>,
    pub start_jitter_ms: Option<u64>,
    pub increase_after_consecutive_successes: Option<u32>,
    pub max_attempts: Option<u32>,
}

/// Effective settings for one admission key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub max_parallel_requests: usize,
    pub initial_parallel_requests: usize,
    pub min_interval_between_start_ms: u64,
    pub start_jitter_ms: u64,
    pub increase_after_consecutive_successes: u32,
    pub max_attempts: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerConfig::default().defaults()
    }
}

impl SchedulerConfig {
    /// Settings with no per-key override applied.
    pub fn defaults(&self) -> SchedulerSettings {
        self.merge(&SchedulerOverride::default())
    }

    /// Settings for `key`, matching override keys case-insensitively.
    pub fn settings_for(&self, key: &str) -> SchedulerSettings {
        let wanted = key.trim().to_lowercase();
        let over = self
            .keys
            .iter()
            .find(|(k, _)| k.trim().to_lowercase() == wanted)
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        self.merge(&over)
    }

    fn merge(&self, over: &SchedulerOverride) -> SchedulerSettings {
        let max = over
            .max_parallel_requests
            .unwrap_or(self.max_parallel_requests)
            .max(1);
        let initial = over
            .initial_parallel_requests
            .or(self.initial_parallel_requests)
            .unwrap_or(max)
            .clamp(1, max);
        SchedulerSettings {
            max_parallel_requests: max,
            initial_parallel_requests: initial,
            min_interval_between_start_ms: over
                .min_interval_between_start_ms
                .unwrap_or(self.min_interval_between_start_ms),
            start_jitter_ms: over.start_jitter_ms.unwrap_or(self.start_jitter_ms),
            increase_after_consecutive_successes: over
                .increase_after_consecutive_successes
                .unwrap_or(self.increase_after_consecutive_successes)
                .max(1),
            max_attempts: over.max_attempts.unwrap_or(self.max_attempts).max(1),
        }
    }
}

/// Exponential backoff between retry attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    /// Add up to ±10% random jitter to each delay.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}
