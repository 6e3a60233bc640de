//! Subagent controller defaults.

use serde::{Deserialize, Serialize};

use super::default_true;

/// Which built-in guidance text to layer into instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPattern {
    /// No built-in guidance.
    #[default]
    None,
    /// Root agent delegates via subagents; children get worker guidance.
    Orchestrator,
}

/// Subagent tooling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Live handles allowed per controller.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,

    /// Deepest level that may still spawn children (root is depth 0).
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Default model for children; the parent's model when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Children get the caller's custom tools.
    #[serde(default = "default_true")]
    pub inherit_tools: bool,

    /// Children get the filesystem tools.
    #[serde(default = "default_true")]
    pub inherit_filesystem_tool: bool,

    #[serde(default)]
    pub prompt_pattern: PromptPattern,

    /// Extra instructions appended for every spawned child.
    #[serde(default)]
    pub instructions: Option<String>,

    #[serde(default = "default_min_wait")]
    pub min_wait_timeout_ms: u64,

    #[serde(default = "default_wait")]
    pub default_wait_timeout_ms: u64,

    #[serde(default = "default_max_wait")]
    pub max_wait_timeout_ms: u64,
}

impl Default for SubagentsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_agents: default_max_agents(),
            max_depth: default_max_depth(),
            model: None,
            inherit_tools: true,
            inherit_filesystem_tool: true,
            prompt_pattern: PromptPattern::None,
            instructions: None,
            min_wait_timeout_ms: default_min_wait(),
            default_wait_timeout_ms: default_wait(),
            max_wait_timeout_ms: default_max_wait(),
        }
    }
}

fn default_max_agents() -> usize {
    4
}

fn default_max_depth() -> u32 {
    1
}

fn default_min_wait() -> u64 {
    1_000
}

fn default_wait() -> u64 {
    30_000
}

fn default_max_wait() -> u64 {
    600_000
}
