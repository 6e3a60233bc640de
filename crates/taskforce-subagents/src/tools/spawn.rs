//! `spawn_agent` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use taskforce_protocols::types::{ContentPart, RiskLevel};

use super::{json_result, parse_params, turn_properties};
use crate::controller::{SpawnOptions, SubagentController};
use crate::input::parse_turn;

#[derive(Debug, Deserialize)]
pub struct SpawnAgentParams {
    #[serde(default, alias = "prompt", alias = "input")]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<ContentPart>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub max_steps: Option<u32>,
}

/// Spawn a child agent and start its first run.
pub struct SpawnAgentTool {
    definition: ToolDefinition,
    controller: Arc<SubagentController>,
}

impl SpawnAgentTool {
    pub fn new(controller: Arc<SubagentController>) -> Self {
        let mut properties = turn_properties();
        properties["model"] = serde_json::json!({
            "type": "string",
            "description": "Model for the child; defaults to the configured subagent model"
        });
        properties["instructions"] = serde_json::json!({
            "type": "string",
            "description": "Extra instructions for this child only"
        });
        properties["max_steps"] = serde_json::json!({
            "type": "integer",
            "minimum": 1,
            "description": "Step budget for each run of the child"
        });
        let definition = ToolDefinition::new(
            "spawn_agent",
            "Spawn a subagent that works on a task concurrently. Returns its agent_id \
             immediately; use wait to collect the result.",
        )
        .with_parameters_schema(serde_json::json!({
            "type": "object",
            "properties": properties
        }))
        .with_risk_level(RiskLevel::Medium);

        Self {
            definition,
            controller,
        }
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
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
        let params: SpawnAgentParams = parse_params(params)?;
        let turn = parse_turn(params.message, params.items)?;
        let spawned = self.controller.spawn(
            turn,
            SpawnOptions {
                model: params.model,
                instructions: params.instructions,
                max_steps: params.max_steps,
            },
        )?;
        debug!(session = %ctx.session_id, agent_id = %spawned.agent_id, "spawn_agent");
        Ok(json_result(&spawned)?.with_metadata("agent_id", serde_json::json!(spawned.agent_id)))
    }
}
