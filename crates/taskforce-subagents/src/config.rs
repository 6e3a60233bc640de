//! Per-depth subagent configuration.

use std::time::Duration;

use serde::Serialize;

use taskforce_config::{PromptPattern, SubagentsConfig};

use crate::error::SubagentError;

/// Subagent settings for one controller, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSubagentConfig {
    pub enabled: bool,
    /// Depth of the agent that owns the controller.
    pub depth: u32,
    pub max_agents: usize,
    pub max_depth: u32,
    /// Model children use unless a spawn names one.
    pub model: String,
    pub inherit_tools: bool,
    pub inherit_filesystem_tool: bool,
    pub prompt_pattern: PromptPattern,
    pub instructions: Option<String>,
    pub min_wait_timeout_ms: u64,
    pub default_wait_timeout_ms: u64,
    pub max_wait_timeout_ms: u64,
}

impl ResolvedSubagentConfig {
    /// Resolve `config` for an agent at `depth` running `parent_model`.
    pub fn resolve(config: &SubagentsConfig, depth: u32, parent_model: &str) -> Self {
        let min = config.min_wait_timeout_ms.max(1);
        let max = config.max_wait_timeout_ms.max(min);
        let model = config
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(parent_model)
            .to_string();
        let instructions = config
            .instructions
            .clone()
            .filter(|i| !i.trim().is_empty());

        Self {
            enabled: config.enabled,
            depth,
            max_agents: config.max_agents,
            max_depth: config.max_depth,
            model,
            inherit_tools: config.inherit_tools,
            inherit_filesystem_tool: config.inherit_filesystem_tool,
            prompt_pattern: config.prompt_pattern,
            instructions,
            min_wait_timeout_ms: min,
            default_wait_timeout_ms: config.default_wait_timeout_ms.clamp(min, max),
            max_wait_timeout_ms: max,
        }
    }

    /// Whether an agent at this depth may spawn children.
    pub fn tools_enabled(&self) -> bool {
        self.enabled && self.depth < self.max_depth
    }

    /// Clamp a requested wait timeout; `None` means the default.
    pub fn wait_timeout(&self, requested_ms: Option<i64>) -> Result<Duration, SubagentError> {
        let ms = match requested_ms {
            None => self.default_wait_timeout_ms,
            Some(ms) if ms <= 0 => return Err(SubagentError::InvalidTimeout),
            Some(ms) => (ms as u64).clamp(self.min_wait_timeout_ms, self.max_wait_timeout_ms),
        };
        Ok(Duration::from_millis(ms))
    }
}
