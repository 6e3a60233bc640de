//! The tool-execution loop the composer wraps.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use taskforce_protocols::error::AgentError;
use taskforce_protocols::provider::CompletionRequest;
use taskforce_protocols::tool::Tool;
use taskforce_protocols::types::Message;
use taskforce_scheduler::ScheduledProvider;
use taskforce_subagents::SubagentOutput;

use crate::notices::NoticeInbox;

/// One fully assembled agent run.
#[derive(Clone)]
pub struct ToolLoopRequest {
    pub depth: u32,
    pub model: String,
    pub input: Vec<Message>,
    pub instructions: Option<String>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub max_steps: u32,
    pub cancel: CancellationToken,
    /// Notices about this agent's own children.
    pub notices: Arc<NoticeInbox>,
}

impl ToolLoopRequest {
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }
}

/// Drives model turns and tool calls until the agent produces its answer.
#[async_trait]
pub trait ToolLoop: Send + Sync {
    async fn run(&self, request: ToolLoopRequest) -> Result<SubagentOutput, AgentError>;
}

/// A loop that answers with a single scheduled completion.
///
/// Tool definitions are advertised to the model but calls are not
/// dispatched; the assistant text is the result.
pub struct CompletionLoop {
    provider: Arc<ScheduledProvider>,
    max_tokens: Option<u32>,
}

impl CompletionLoop {
    pub fn new(provider: Arc<ScheduledProvider>) -> Self {
        Self {
            provider,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl ToolLoop for CompletionLoop {
    async fn run(&self, request: ToolLoopRequest) -> Result<SubagentOutput, AgentError> {
        if request.max_steps == 0 {
            return Err(AgentError::MaxStepsExceeded(0));
        }

        let definitions = request.tools.iter().map(|t| t.definition().clone()).collect();
        let mut messages = request.input;
        messages.extend(request.notices.drain().into_iter().map(Message::user));
        let mut completion =
            CompletionRequest::new(request.model.clone(), messages).with_tools(definitions);
        if let Some(system) = request.instructions {
            completion = completion.with_system(system);
        }
        completion.max_tokens = self.max_tokens;

        debug!(depth = request.depth, model = %request.model, "Requesting completion");
        let response = self
            .provider
            .complete_cancellable(completion, request.cancel)
            .await?;

        Ok(SubagentOutput {
            text: response.message.content.text(),
            steps: 1,
            total_cost_usd: response.cost_usd,
        })
    }
}
