//! Keyed scheduler registry.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use taskforce_config::{RetryConfig, SchedulerConfig};

use crate::classify::{CallError, DefaultOverloadClassifier, OverloadClassifier};
use crate::policy::{BackoffPolicy, RetryPolicy};
use crate::scheduler::{CallScheduler, RunOptions, SchedulerStats};

/// Key shared by every call that does not name one.
pub const DEFAULT_KEY: &str = "default";

/// Trim and lowercase an admission key; blank keys share [`DEFAULT_KEY`].
pub fn normalize_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        Some(k) if !k.is_empty() => k.to_lowercase(),
        _ => DEFAULT_KEY.to_string(),
    }
}

/// One [`CallScheduler`] per admission key, created on first use.
pub struct SchedulerRegistry {
    config: SchedulerConfig,
    retry_policy: Arc<dyn RetryPolicy>,
    classifier: Arc<dyn OverloadClassifier>,
    schedulers: DashMap<String, Arc<CallScheduler>>,
}

impl SchedulerRegistry {
    pub fn new(config: SchedulerConfig, retry: &RetryConfig) -> Self {
        Self {
            config,
            retry_policy: Arc::new(BackoffPolicy::from_config(retry)),
            classifier: Arc::new(DefaultOverloadClassifier),
            schedulers: DashMap::new(),
        }
    }

    /// Replace the retry policy used by schedulers created from now on.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OverloadClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Scheduler for `key`, created from the defaults plus any override.
    pub fn get(&self, key: Option<&str>) -> Arc<CallScheduler> {
        let key = normalize_key(key);
        if let Some(existing) = self.schedulers.get(&key) {
            return existing.clone();
        }
        self.schedulers
            .entry(key.clone())
            .or_insert_with(|| {
                let settings = self.config.settings_for(&key);
                debug!("Creating call scheduler for '{}': {:?}", key, settings);
                Arc::new(CallScheduler::with_policies(
                    key.clone(),
                    settings,
                    self.retry_policy.clone(),
                    self.classifier.clone(),
                ))
            })
            .clone()
    }

    /// Run `f` through the scheduler for `key`.
    pub async fn run<F, Fut, T, E>(
        &self,
        key: Option<&str>,
        f: F,
        options: RunOptions,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: CallError,
    {
        let scheduler = self.get(key);
        scheduler.run(f, options).await
    }

    /// Stats for every key seen so far, sorted by key.
    pub fn snapshot(&self) -> Vec<SchedulerStats> {
        let mut stats: Vec<_> = self
            .schedulers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new(SchedulerConfig::default(), &RetryConfig::default())
    }
}
