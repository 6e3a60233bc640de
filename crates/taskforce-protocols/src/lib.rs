//! # Taskforce Protocols
//!
//! Shared protocol definitions for the taskforce runtime.
//! Contains interface definitions and plain data types only.
//!
//! ## Core Traits
//!
//! - [`Tool`] - Trait for tool implementations
//! - [`LLMProvider`] - Trait for model backends

pub mod error;
pub mod provider;
pub mod tool;
pub mod types;

pub use error::{AgentError, ProviderError, ToolError};
pub use provider::{CompletionRequest, CompletionResponse, LLMProvider};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolResult};
pub use types::*;
