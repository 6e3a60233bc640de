//! Tool execution context.

use tokio_util::sync::CancellationToken;

/// Context for tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session the calling agent runs in.
    pub session_id: String,

    /// Cancellation for the run this call belongs to.
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Check if the operation should be aborted.
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
