//! `close_agent` tool.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use taskforce_protocols::types::RiskLevel;

use super::{json_result, parse_params, target_properties, AgentTargets};
use crate::controller::{CloseOutcome, SubagentController};

#[derive(Debug, Serialize)]
pub struct CloseAgentResult {
    pub agents: BTreeMap<String, CloseOutcome>,
}

/// Cancel and close children.
pub struct CloseAgentTool {
    definition: ToolDefinition,
    controller: Arc<SubagentController>,
}

impl CloseAgentTool {
    pub fn new(controller: Arc<SubagentController>) -> Self {
        let definition = ToolDefinition::new(
            "close_agent",
            "Close subagents, cancelling any run in flight. Closed agents accept no \
             further operations.",
        )
        .with_parameters_schema(serde_json::json!({
            "type": "object",
            "properties": target_properties()
        }))
        .with_risk_level(RiskLevel::Medium);

        Self {
            definition,
            controller,
        }
    }
}

#[async_trait]
impl Tool for CloseAgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let targets: AgentTargets = parse_params(params)?;
        let agents = self.controller.close_many(&targets.into_ids()?)?;
        json_result(&CloseAgentResult { agents })
    }
}
