//! `resume_agent` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolContext, ToolDefinition, ToolResult};

use super::{json_result, parse_params};
use crate::controller::SubagentController;

#[derive(Debug, Deserialize)]
pub struct ResumeAgentParams {
    #[serde(alias = "id")]
    pub agent_id: String,
}

/// Run an idle child on its oldest queued input.
pub struct ResumeAgentTool {
    definition: ToolDefinition,
    controller: Arc<SubagentController>,
}

impl ResumeAgentTool {
    pub fn new(controller: Arc<SubagentController>) -> Self {
        let definition = ToolDefinition::new(
            "resume_agent",
            "Resume an idle subagent with its oldest queued input.",
        )
        .with_parameters_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "agent_id": {
                    "type": "string",
                    "description": "Target agent (alias: id)"
                }
            },
            "required": ["agent_id"]
        }));

        Self {
            definition,
            controller,
        }
    }
}

#[async_trait]
impl Tool for ResumeAgentTool {
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
        let params: ResumeAgentParams = parse_params(params)?;
        let outcome = self.controller.resume(&params.agent_id)?;
        json_result(&outcome)
    }
}
