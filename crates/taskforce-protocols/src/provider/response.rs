//! Completion response types.

use serde::{Deserialize, Serialize};

use crate::types::{Message, Usage};

/// Response from a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique ID for this completion.
    pub id: String,

    /// Model used.
    pub model: String,

    /// The assistant's response message.
    pub message: Message,

    /// Token usage.
    #[serde(default)]
    pub usage: Usage,

    /// Cost of this call in USD, when the provider reports it.
    #[serde(default)]
    pub cost_usd: f64,
}
