//! The Provider trait, the abstraction over language-model backends.
//!
//! A Provider takes the system prompt, the full history and the tool
//! descriptors, and answers with either plain text or one or more tool calls.
//!
//! Implementations: OpenAI-compatible endpoints (OpenAI, OpenRouter, Ollama)
//! and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolCall;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Sent ahead of the history; empty means none
    #[serde(default)]
    pub system_prompt: String,

    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelReply {
    /// A final assistant message with no tool calls
    Text(String),

    /// One or more tool calls, optionally with accompanying text
    ToolCalls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl ModelReply {
    /// Build a reply from raw parts. An empty call list means a text reply.
    pub fn from_parts(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        if calls.is_empty() {
            Self::Text(content.unwrap_or_default())
        } else {
            Self::ToolCalls {
                thought: content,
                calls,
            }
        }
    }
}

/// The core Provider trait.
///
/// The agent calls `complete()` without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get the model's reply.
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, ProviderError>;
}
