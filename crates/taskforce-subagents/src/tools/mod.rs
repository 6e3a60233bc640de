//! Model-facing subagent control tools.

use std::sync::Arc;

use serde::Deserialize;

use taskforce_protocols::error::ToolError;
use taskforce_protocols::tool::{Tool, ToolResult};

use crate::controller::SubagentController;
use crate::error::SubagentError;

mod close;
mod resume;
mod send_input;
mod spawn;
mod wait;

pub use close::*;
pub use resume::*;
pub use send_input::*;
pub use spawn::*;
pub use wait::*;

/// The five control tools, bound to `controller`.
pub fn subagent_tools(controller: Arc<SubagentController>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SpawnAgentTool::new(controller.clone())),
        Arc::new(SendInputTool::new(controller.clone())),
        Arc::new(ResumeAgentTool::new(controller.clone())),
        Arc::new(WaitTool::new(controller.clone())),
        Arc::new(CloseAgentTool::new(controller)),
    ]
}

/// `agent_id`/`id` or `ids`, for tools that address several handles.
#[derive(Debug, Default, Deserialize)]
pub struct AgentTargets {
    #[serde(default, alias = "id")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

impl AgentTargets {
    pub fn into_ids(self) -> Result<Vec<String>, SubagentError> {
        match (self.agent_id, self.ids) {
            (Some(_), Some(_)) => Err(SubagentError::ConflictingTargets),
            (Some(id), None) if !id.trim().is_empty() => Ok(vec![id]),
            (None, Some(ids)) if !ids.is_empty() => Ok(ids),
            _ => Err(SubagentError::MissingTargets),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(params)
        .map_err(|e| ToolError::InvalidParameters(format!("Invalid params: {}", e)))
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<ToolResult, ToolError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to encode result: {}", e)))?;
    Ok(ToolResult::json(value))
}

/// Schema fragment shared by spawn and send.
fn turn_properties() -> serde_json::Value {
    serde_json::json!({
        "message": {
            "type": "string",
            "description": "Free-text turn for the agent (aliases: prompt, input)"
        },
        "items": {
            "type": "array",
            "description": "Structured turn parts; use instead of message, never together",
            "items": {
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["text", "image", "file"] }
                },
                "required": ["type"]
            }
        }
    })
}

fn target_properties() -> serde_json::Value {
    serde_json::json!({
        "agent_id": {
            "type": "string",
            "description": "A single agent id (alias: id)"
        },
        "ids": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Several agent ids"
        }
    })
}
