//! `wait` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolContext, ToolDefinition, ToolResult};

use super::{json_result, parse_params, target_properties, AgentTargets};
use crate::controller::SubagentController;

#[derive(Debug, Deserialize)]
pub struct WaitParams {
    #[serde(flatten)]
    pub targets: AgentTargets,
    #[serde(default)]
    pub timeout_ms: Option<i64>,
}

/// Block until a child finishes its run or the timeout elapses.
pub struct WaitTool {
    definition: ToolDefinition,
    controller: Arc<SubagentController>,
}

impl WaitTool {
    pub fn new(controller: Arc<SubagentController>) -> Self {
        let config = controller.config();
        let mut properties = target_properties();
        properties["timeout_ms"] = serde_json::json!({
            "type": "integer",
            "description": format!(
                "How long to wait, clamped to [{}, {}] ms; default {} ms",
                config.min_wait_timeout_ms,
                config.max_wait_timeout_ms,
                config.default_wait_timeout_ms
            )
        });
        let definition = ToolDefinition::new(
            "wait",
            "Wait for any of the given subagents to stop running. Returns timed_out and \
             the status and last result of every requested agent.",
        )
        .with_parameters_schema(serde_json::json!({
            "type": "object",
            "properties": properties
        }));

        Self {
            definition,
            controller,
        }
    }
}

#[async_trait]
impl Tool for WaitTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: WaitParams = parse_params(params)?;
        let ids = params.targets.into_ids()?;
        let outcome = tokio::select! {
            outcome = self.controller.wait(&ids, params.timeout_ms) => outcome?,
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
        };
        json_result(&outcome)
    }
}
