//! # Taskforce Runtime
//!
//! Composes one agent run per nesting depth: merges the tool sets, layers
//! the instructions, attaches a subagent controller when the depth allows
//! it and recurses one level deeper for every child run.

mod composer;
mod error;
mod instructions;
mod notices;
mod tool_loop;
mod toolset;

pub use composer::{AgentComposer, ComposeRequest};
pub use error::ComposeError;
pub use instructions::{build_instructions, ORCHESTRATOR_GUIDANCE, WORKER_GUIDANCE};
pub use notices::NoticeInbox;
pub use tool_loop::{CompletionLoop, ToolLoop, ToolLoopRequest};
pub use toolset::ToolSet;
