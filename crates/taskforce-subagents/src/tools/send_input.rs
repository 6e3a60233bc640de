//! `send_input` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use taskforce_protocols::types::ContentPart;

use super::{json_result, parse_params, turn_properties};
use crate::controller::SubagentController;
use crate::input::parse_turn;

#[derive(Debug, Deserialize)]
pub struct SendInputParams {
    #[serde(alias = "id")]
    pub agent_id: String,
    #[serde(default, alias = "prompt", alias = "input")]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<ContentPart>>,
}

/// Send a turn to a child; queued if it is busy.
pub struct SendInputTool {
    definition: ToolDefinition,
    controller: Arc<SubagentController>,
}

impl SendInputTool {
    pub fn new(controller: Arc<SubagentController>) -> Self {
        let mut properties = turn_properties();
        properties["agent_id"] = serde_json::json!({
            "type": "string",
            "description": "Target agent (alias: id)"
        });
        let definition = ToolDefinition::new(
            "send_input",
            "Send a message to a subagent. Starts a run if the agent is idle; otherwise \
             the input is queued and never interrupts the current run.",
        )
        .with_parameters_schema(serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": ["agent_id"]
        }));

        Self {
            definition,
            controller,
        }
    }
}

#[async_trait]
impl Tool for SendInputTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        if ctx.is_aborted() {
            return Err(ToolError::Cancelled);
        }
        let params: SendInputParams = parse_params(params)?;
        let turn = parse_turn(params.message, params.items)?;
        let outcome = self.controller.send_input(&params.agent_id, turn)?;
        json_result(&outcome)
    }
}
