//! Shared test helpers for runner and strategy tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use stepwise_core::error::{ProviderError, ToolError};
use stepwise_core::provider::{ModelReply, ModelRequest, Provider};
use stepwise_core::tool::{Tool, ToolCall, ToolRegistry};

/// A mock provider that plays back scripted replies.
///
/// Each call to `complete` pops the next reply. Once the script runs out the
/// last reply is repeated. Every request is recorded for later inspection.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ModelReply, ProviderError>>>,
    last: Mutex<Option<Result<ModelReply, ProviderError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ModelReply, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn always_text(text: &str) -> Self {
        Self::new(vec![Ok(ModelReply::Text(text.into()))])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| panic!("ScriptedProvider: no replies scripted"))
    }
}

/// A reply requesting the given calls.
pub fn tool_calls(calls: Vec<ToolCall>) -> Result<ModelReply, ProviderError> {
    Ok(ModelReply::ToolCalls {
        thought: None,
        calls,
    })
}

pub fn text(reply: &str) -> Result<ModelReply, ProviderError> {
    Ok(ModelReply::Text(reply.into()))
}

pub fn call(id: &str, name: &str) -> ToolCall {
    ToolCall::new(id, name, serde_json::json!({}))
}

/// Echoes its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the text argument"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok(arguments["text"].as_str().unwrap_or("echo").to_string())
    }
}

/// Panics on every call.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        panic!("tool blew up");
    }
}

/// Stops the run without touching any counters.
pub struct StopTool;

#[async_trait]
impl Tool for StopTool {
    fn name(&self) -> &str {
        stepwise_core::tool::TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Finish the task"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok("Task finished".into())
    }
}

/// Registry with echo, explode and terminate.
pub fn test_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(PanickingTool));
    registry.register(Box::new(StopTool));
    registry
}
