//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, SchedulerOverride};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(()),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_retry(config, &mut result);
        Self::validate_subagents(config, &mut result);

        result
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let s = &config.scheduler;
        if s.max_parallel_requests == 0 {
            result.add_error(ValidationError::new(
                "scheduler.max_parallel_requests",
                "max_parallel_requests must be greater than 0",
            ));
        }
        if let Some(initial) = s.initial_parallel_requests {
            if initial == 0 || initial > s.max_parallel_requests {
                result.add_error(ValidationError::new(
                    "scheduler.initial_parallel_requests",
                    "initial_parallel_requests must be between 1 and max_parallel_requests",
                ));
            }
        }
        if s.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "scheduler.max_attempts",
                "max_attempts must be at least 1",
            ));
        }
        if s.increase_after_consecutive_successes == 0 {
            result.add_error(ValidationError::new(
                "scheduler.increase_after_consecutive_successes",
                "increase_after_consecutive_successes must be at least 1",
            ));
        }
        if s.max_parallel_requests > 256 {
            result.add_warning(ValidationWarning::new(
                "scheduler.max_parallel_requests",
                "max_parallel_requests is very high (>256), providers will likely throttle",
            ));
        }

        for (key, over) in &s.keys {
            Self::validate_override(key, over, result);
        }
    }

    fn validate_override(key: &str, over: &SchedulerOverride, result: &mut ValidationResult) {
        if key.trim().is_empty() {
            result.add_error(ValidationError::new(
                "scheduler.keys",
                "Override key cannot be empty",
            ));
        }
        if over.max_parallel_requests == Some(0) {
            result.add_error(ValidationError::new(
                format!("scheduler.keys.{}.max_parallel_requests", key),
                "max_parallel_requests must be greater than 0",
            ));
        }
        if over.max_attempts == Some(0) {
            result.add_error(ValidationError::new(
                format!("scheduler.keys.{}.max_attempts", key),
                "max_attempts must be at least 1",
            ));
        }
    }

    fn validate_retry(config: &Config, result: &mut ValidationResult) {
        let r = &config.retry;
        if r.backoff_multiplier < 1.0 {
            result.add_error(ValidationError::new(
                "retry.backoff_multiplier",
                "backoff_multiplier must be at least 1.0",
            ));
        }
        if r.base_delay_ms > r.max_delay_ms {
            result.add_error(ValidationError::new(
                "retry.base_delay_ms",
                "base_delay_ms cannot exceed max_delay_ms",
            ));
        }
    }

    fn validate_subagents(config: &Config, result: &mut ValidationResult) {
        let s = &config.subagents;
        if !s.enabled {
            return;
        }
        if s.max_agents == 0 {
            result.add_error(ValidationError::new(
                "subagents.max_agents",
                "max_agents must be greater than 0 when subagents are enabled",
            ));
        }
        if s.max_depth == 0 {
            result.add_warning(ValidationWarning::new(
                "subagents.max_depth",
                "max_depth is 0, no agent will be able to spawn subagents",
            ));
        }
        if s.min_wait_timeout_ms > s.max_wait_timeout_ms {
            result.add_error(ValidationError::new(
                "subagents.min_wait_timeout_ms",
                "min_wait_timeout_ms cannot exceed max_wait_timeout_ms",
            ));
        }
        if s.default_wait_timeout_ms < s.min_wait_timeout_ms
            || s.default_wait_timeout_ms > s.max_wait_timeout_ms
        {
            result.add_warning(ValidationWarning::new(
                "subagents.default_wait_timeout_ms",
                "default_wait_timeout_ms is outside [min, max] and will be clamped",
            ));
        }
        if let Some(model) = &s.model {
            if model.trim().is_empty() {
                result.add_error(ValidationError::new(
                    "subagents.model",
                    "model cannot be blank; omit it to inherit the parent's model",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
