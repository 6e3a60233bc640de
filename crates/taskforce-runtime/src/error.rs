//! Composer errors.

use thiserror::Error;

use taskforce_protocols::error::AgentError;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<ComposeError> for AgentError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Agent(err) => err,
            other => AgentError::ExecutionFailed(other.to_string()),
        }
    }
}
