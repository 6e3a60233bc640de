//! Agent run errors.

use thiserror::Error;

use super::ProviderError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Max steps exceeded: {0}")]
    MaxStepsExceeded(u32),

    #[error("Agent was aborted")]
    Aborted,

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),
}

impl AgentError {
    /// True when the run ended because its cancellation token fired.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            AgentError::Aborted | AgentError::ProviderError(ProviderError::Cancelled)
        )
    }
}
