//! Recursive agent composition.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskforce_config::SubagentsConfig;
use taskforce_protocols::error::AgentError;
use taskforce_protocols::tool::Tool;
use taskforce_protocols::types::Message;
use taskforce_subagents::{
    subagent_tools, BackgroundSink, ResolvedSubagentConfig, SubagentController, SubagentOutput,
    SubagentRequest, SubagentRunner,
};

use crate::error::ComposeError;
use crate::instructions::build_instructions;
use crate::notices::NoticeInbox;
use crate::tool_loop::{ToolLoop, ToolLoopRequest};
use crate::toolset::ToolSet;

const DEFAULT_MAX_STEPS: u32 = 50;

/// Everything needed to run one agent at one depth.
#[derive(Clone)]
pub struct ComposeRequest {
    pub depth: u32,
    pub model: String,
    pub input: Vec<Message>,
    /// Instructions from whoever started this agent.
    pub instructions: Option<String>,
    /// Instructions attached to the spawn that created this agent.
    pub spawn_instructions: Option<String>,
    pub custom_tools: Vec<Arc<dyn Tool>>,
    pub filesystem_tools: Vec<Arc<dyn Tool>>,
    pub subagents: SubagentsConfig,
    pub max_steps: Option<u32>,
    pub cancel: CancellationToken,
    /// Also receives notices about this agent's children.
    pub background: Option<Arc<dyn BackgroundSink>>,
}

impl ComposeRequest {
    /// A root request with no tools and default subagent settings.
    pub fn new(model: impl Into<String>, input: Vec<Message>) -> Self {
        Self {
            depth: 0,
            model: model.into(),
            input,
            instructions: None,
            spawn_instructions: None,
            custom_tools: Vec::new(),
            filesystem_tools: Vec::new(),
            subagents: SubagentsConfig::default(),
            max_steps: None,
            cancel: CancellationToken::new(),
            background: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_subagents(mut self, subagents: SubagentsConfig) -> Self {
        self.subagents = subagents;
        self
    }

    pub fn with_custom_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.custom_tools = tools;
        self
    }

    pub fn with_filesystem_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.filesystem_tools = tools;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_background_sink(mut self, sink: Arc<dyn BackgroundSink>) -> Self {
        self.background = Some(sink);
        self
    }
}

/// Runs agents, attaching a subagent controller at every depth that may
/// still spawn children.
pub struct AgentComposer {
    tool_loop: Arc<dyn ToolLoop>,
    default_max_steps: u32,
}

impl AgentComposer {
    pub fn new(tool_loop: Arc<dyn ToolLoop>) -> Self {
        Self {
            tool_loop,
            default_max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_default_max_steps(mut self, max_steps: u32) -> Self {
        self.default_max_steps = max_steps;
        self
    }

    /// Run one agent to completion.
    ///
    /// Every child spawned during the run is closed before this returns,
    /// and also when the returned future is dropped.
    pub async fn run(self: &Arc<Self>, request: ComposeRequest) -> Result<SubagentOutput, ComposeError> {
        let resolved = ResolvedSubagentConfig::resolve(&request.subagents, request.depth, &request.model);
        let notices = Arc::new(match request.background.clone() {
            Some(sink) => NoticeInbox::forwarding_to(sink),
            None => NoticeInbox::new(),
        });
        let controller = resolved
            .tools_enabled()
            .then(|| self.controller(&request, resolved.clone(), notices.clone()));

        let mut tools = ToolSet::new();
        tools.extend(request.filesystem_tools.iter().cloned())?;
        if let Some(controller) = &controller {
            tools.extend(subagent_tools(controller.clone()))?;
        }
        tools.extend(request.custom_tools.iter().cloned())?;

        let instructions = build_instructions(
            request.depth,
            resolved.prompt_pattern,
            request.instructions.as_deref(),
            request.spawn_instructions.as_deref(),
        );

        info!(
            depth = request.depth,
            model = %request.model,
            tools = tools.len(),
            subagents = controller.is_some(),
            "Starting agent run"
        );

        let _teardown = controller.map(Teardown);
        let cancel = request.cancel.clone();
        let loop_request = ToolLoopRequest {
            depth: request.depth,
            model: request.model,
            input: request.input,
            instructions,
            tools: tools.into_vec(),
            max_steps: request.max_steps.unwrap_or(self.default_max_steps),
            cancel: cancel.clone(),
            notices,
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Aborted),
            result = self.tool_loop.run(loop_request) => result,
        };

        match &result {
            Ok(output) => debug!(depth = request.depth, steps = output.steps, "Agent run finished"),
            Err(e) if e.is_cancellation() => info!(depth = request.depth, "Agent run cancelled"),
            Err(e) => warn!(depth = request.depth, "Agent run failed: {}", e),
        }
        result.map_err(ComposeError::from)
    }

    fn controller(
        self: &Arc<Self>,
        request: &ComposeRequest,
        resolved: ResolvedSubagentConfig,
        notices: Arc<NoticeInbox>,
    ) -> Arc<SubagentController> {
        let runner = ChildRunner {
            composer: self.clone(),
            custom_tools: if resolved.inherit_tools {
                request.custom_tools.clone()
            } else {
                Vec::new()
            },
            filesystem_tools: if resolved.inherit_filesystem_tool {
                request.filesystem_tools.clone()
            } else {
                Vec::new()
            },
            subagents: request.subagents.clone(),
            instructions: resolved.instructions.clone(),
        };

        Arc::new(SubagentController::new(resolved, Arc::new(runner)).with_background_sink(notices))
    }
}

/// Closes every child when the parent run ends.
struct Teardown(Arc<SubagentController>);

impl Drop for Teardown {
    fn drop(&mut self) {
        let closed = self.0.close_all();
        if closed > 0 {
            info!(depth = self.0.config().depth, closed, "Closed subagents");
        }
    }
}

/// Runs a child one level below the controller that owns it.
struct ChildRunner {
    composer: Arc<AgentComposer>,
    custom_tools: Vec<Arc<dyn Tool>>,
    filesystem_tools: Vec<Arc<dyn Tool>>,
    subagents: SubagentsConfig,
    instructions: Option<String>,
}

#[async_trait]
impl SubagentRunner for ChildRunner {
    async fn run(&self, request: SubagentRequest) -> Result<SubagentOutput, AgentError> {
        debug!(agent_id = %request.agent_id, depth = request.depth, "Composing child run");
        let compose = ComposeRequest {
            depth: request.depth,
            model: request.model,
            input: request.input,
            instructions: self.instructions.clone(),
            spawn_instructions: request.instructions,
            custom_tools: self.custom_tools.clone(),
            filesystem_tools: self.filesystem_tools.clone(),
            subagents: self.subagents.clone(),
            max_steps: request.max_steps,
            cancel: request.cancel,
            background: None,
        };
        self.composer.run(compose).await.map_err(AgentError::from)
    }
}
