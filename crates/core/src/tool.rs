//! The Tool trait and the registry that dispatches calls to tools.
//!
//! Tools are what give the agent the ability to act: look up the date, search
//! the web, read a file, or stop the run. The registry is the only way the
//! agent reaches them, and invoking through it never fails.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Reserved name of the tool that asks the agent to stop.
///
/// Any tool registered under this name acts as the termination signal,
/// whatever its implementation does.
pub const TERMINATE_TOOL_NAME: &str = "terminate";

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.name == TERMINATE_TOOL_NAME
    }
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutput {
    Success(String),
    Error(String),
}

impl ToolOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Text as it is shown to the model.
    pub fn text(&self) -> String {
        match self {
            Self::Success(text) => text.clone(),
            Self::Error(text) => format!("Error: {text}"),
        }
    }
}

/// The result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Which tool ran
    pub tool_name: String,

    pub output: ToolOutput,
}

/// The core Tool trait.
///
/// Each built-in tool (terminate, date_time, web_search, file_read,
/// file_write) implements this trait and is registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "date_time").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A fixed set of named tools.
///
/// Built once before a run and shared read-only with the agent.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name so requests are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call.
    ///
    /// Unknown tools, tool errors and tool panics all come back as
    /// [`ToolOutput::Error`].
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let output = match self.tools.get(&call.name) {
            None => ToolOutput::Error(ToolError::NotFound(call.name.clone()).to_string()),
            Some(tool) => {
                let fut = tool.execute(call.arguments.clone());
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(text)) => ToolOutput::Success(text),
                    Ok(Err(e)) => ToolOutput::Error(e.to_string()),
                    Err(payload) => ToolOutput::Error(format!(
                        "Tool '{}' panicked: {}",
                        call.name,
                        panic_message(payload.as_ref())
                    )),
                }
            }
        };

        if let ToolOutput::Error(reason) = &output {
            tracing::warn!(tool = %call.name, call_id = %call.id, %reason, "Tool call failed");
        }

        ToolResult {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
