//! Controller errors.

use thiserror::Error;

use taskforce_protocols::error::ToolError;

/// Errors from subagent control operations.
///
/// All of these are raised synchronously and never retried.
#[derive(Debug, Error)]
pub enum SubagentError {
    #[error("Subagents are disabled at depth {0}")]
    Disabled(u32),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent {0} is closed")]
    Closed(String),

    #[error("Max agents ({0}) reached; close an agent before spawning another")]
    MaxAgentsReached(usize),

    #[error("Provide either a message or items, but not both")]
    ConflictingInput,

    #[error("Provide one of: message or items")]
    MissingInput,

    #[error("{0}")]
    EmptyInput(&'static str),

    #[error("Provide either agent_id or ids, but not both")]
    ConflictingTargets,

    #[error("At least one agent id is required")]
    MissingTargets,

    #[error("Agent {0} is not idle")]
    NotIdle(String),

    #[error("Agent {0} has no pending inputs")]
    NoPendingInputs(String),

    #[error("timeout_ms must be greater than zero")]
    InvalidTimeout,
}

impl From<SubagentError> for ToolError {
    fn from(err: SubagentError) -> Self {
        match err {
            SubagentError::Disabled(_) | SubagentError::MaxAgentsReached(_) => {
                ToolError::ExecutionFailed(err.to_string())
            }
            _ => ToolError::InvalidParameters(err.to_string()),
        }
    }
}
