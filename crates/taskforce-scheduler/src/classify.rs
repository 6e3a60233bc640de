//! Failure classification.

use std::time::Duration;

use taskforce_protocols::error::{AgentError, ProviderError};

/// Errors the scheduler knows how to inspect.
pub trait CallError: std::fmt::Display + Send + 'static {
    /// HTTP-like status code, if the error carries one.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Backoff hint supplied by the backend.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Whether a retry could plausibly succeed.
    fn is_retryable(&self) -> bool {
        true
    }

    /// The value returned when a call is cancelled before it completes.
    fn cancelled() -> Self
    where
        Self: Sized;
}

impl CallError for ProviderError {
    fn status_code(&self) -> Option<u16> {
        ProviderError::status_code(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        ProviderError::retry_after(self)
    }

    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn cancelled() -> Self {
        ProviderError::Cancelled
    }
}

impl CallError for AgentError {
    fn status_code(&self) -> Option<u16> {
        match self {
            AgentError::ProviderError(e) => e.status_code(),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AgentError::ProviderError(e) => e.retry_after(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            AgentError::ProviderError(e) => e.is_transient(),
            _ => false,
        }
    }

    fn cancelled() -> Self {
        AgentError::Aborted
    }
}

/// A failed attempt, as seen by classifiers and retry policies.
#[derive(Debug, Clone)]
pub struct CallFailure {
    /// 1-based attempt number that produced this failure.
    pub attempt: u32,
    pub status: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
    pub retryable: bool,
    /// Set by the scheduler after classification.
    pub overload: bool,
}

impl CallFailure {
    pub fn from_error<E: CallError>(error: &E, attempt: u32) -> Self {
        Self {
            attempt,
            status: error.status_code(),
            message: error.to_string(),
            retry_after: error.retry_after(),
            retryable: error.is_retryable(),
            overload: false,
        }
    }
}

/// Decides whether a failure means "back off, you are sending too much".
pub trait OverloadClassifier: Send + Sync {
    fn is_overload(&self, failure: &CallFailure) -> bool;
}

impl<F> OverloadClassifier for F
where
    F: Fn(&CallFailure) -> bool + Send + Sync,
{
    fn is_overload(&self, failure: &CallFailure) -> bool {
        self(failure)
    }
}

const OVERLOAD_STATUSES: &[u16] = &[429, 503, 529];

const OVERLOAD_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "overloaded",
    "resource exhausted",
    "resource_exhausted",
    "server is busy",
];

/// Status 429/503/529, or a message that reads like throttling.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOverloadClassifier;

impl OverloadClassifier for DefaultOverloadClassifier {
    fn is_overload(&self, failure: &CallFailure) -> bool {
        if let Some(status) = failure.status {
            if OVERLOAD_STATUSES.contains(&status) {
                return true;
            }
        }
        let message = failure.message.to_lowercase();
        OVERLOAD_PHRASES.iter().any(|p| message.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(err: &ProviderError) -> CallFailure {
        CallFailure::from_error(err, 1)
    }

    #[test]
    fn test_overload_statuses() {
        let classifier = DefaultOverloadClassifier;
        for status in [429, 503, 529] {
            let err = ProviderError::ApiError {
                status,
                message: "x".to_string(),
            };
            assert!(classifier.is_overload(&failure(&err)), "status {}", status);
        }
        let err = ProviderError::ApiError {
            status: 500,
            message: "internal".to_string(),
        };
        assert!(!classifier.is_overload(&failure(&err)));
    }

    #[test]
    fn test_overload_message_heuristics() {
        let classifier = DefaultOverloadClassifier;
        let err = ProviderError::Network("upstream says: Overloaded, please retry".to_string());
        assert!(classifier.is_overload(&failure(&err)));
        let err = ProviderError::RateLimited {
            retry_after_seconds: 1,
        };
        assert!(classifier.is_overload(&failure(&err)));
        let err = ProviderError::Network("connection reset".to_string());
        assert!(!classifier.is_overload(&failure(&err)));
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |f: &CallFailure| f.message.contains("slow down");
        let err = ProviderError::Network("please slow down".to_string());
        assert!(classifier.is_overload(&failure(&err)));
    }

    #[test]
    fn test_failure_from_agent_error() {
        let err = AgentError::ProviderError(ProviderError::RateLimited {
            retry_after_seconds: 3,
        });
        let f = CallFailure::from_error(&err, 2);
        assert_eq!(f.attempt, 2);
        assert_eq!(f.status, Some(429));
        assert_eq!(f.retry_after, Some(Duration::from_secs(3)));
        assert!(f.retryable);

        let f = CallFailure::from_error(&AgentError::MaxStepsExceeded(3), 1);
        assert!(!f.retryable);
    }
}
