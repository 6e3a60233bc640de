//! Collaborator seams.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskforce_protocols::error::AgentError;
use taskforce_protocols::types::Message;

/// One run of a child agent.
#[derive(Debug, Clone)]
pub struct SubagentRequest {
    pub agent_id: String,
    pub model: String,
    /// Depth the child runs at.
    pub depth: u32,
    /// Full transcript, ending with the turn being answered.
    pub input: Vec<Message>,
    pub instructions: Option<String>,
    pub max_steps: Option<u32>,
    /// Fires when the handle is closed.
    pub cancel: CancellationToken,
}

/// Output of a finished child run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubagentOutput {
    pub text: String,
    pub steps: u32,
    pub total_cost_usd: f64,
}

/// Executes child runs.
#[async_trait]
pub trait SubagentRunner: Send + Sync {
    async fn run(&self, request: SubagentRequest) -> Result<SubagentOutput, AgentError>;
}

/// Receives completion notices nobody was waiting for.
pub trait BackgroundSink: Send + Sync {
    fn notify(&self, text: &str);
}
