//! Terminate tool, which lets the model end the run.
//!
//! The agent recognizes the call by name; this implementation only resets
//! the run-scoped counters and acknowledges.

use async_trait::async_trait;
use stepwise_core::counter::RunCounters;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{TERMINATE_TOOL_NAME, Tool};

pub struct TerminateTool {
    counters: RunCounters,
}

impl TerminateTool {
    pub fn new(counters: RunCounters) -> Self {
        Self { counters }
    }
}

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met or if the assistant cannot proceed further with the task. \
         When you have finished all the tasks, call this tool to end the work."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        self.counters.reset_all();
        tracing::info!("Terminate requested, run counters reset");
        Ok("Task finished".into())
    }
}
