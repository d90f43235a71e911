//! Tool-calling think/act strategy.
//!
//! Think sends the conversation plus the tool catalog to the model. If the
//! model asks for tools, act runs them in order and appends one result
//! message per call. A call to the terminate tool finishes the run once
//! every call in the batch has been answered.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use stepwise_core::Result;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::message::Message;
use stepwise_core::provider::{ModelReply, ModelRequest, Provider};
use stepwise_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, warn};

use crate::strategy::{ReAct, StepContext, ThinkAct};

pub struct ToolCallAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    pending: Vec<ToolCall>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolCallAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            pending: Vec::new(),
            event_bus: None,
        }
    }

    /// Publish a `ToolExecuted` event per call.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Wrap in the [`ReAct`] adapter so the runner can drive it.
    pub fn into_strategy(self) -> ReAct<Self> {
        ReAct::new(self)
    }

    /// Calls chosen by the last think that have not run yet.
    pub fn pending(&self) -> &[ToolCall] {
        &self.pending
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl ThinkAct for ToolCallAgent {
    async fn think(&mut self, ctx: &mut StepContext<'_>) -> Result<bool> {
        if let Some(hint) = ctx.next_step_prompt.filter(|h| !h.trim().is_empty()) {
            ctx.history.push(Message::user(hint));
        }

        let request = ModelRequest {
            system_prompt: ctx.system_prompt.to_string(),
            messages: ctx.history.messages().to_vec(),
            tools: self.tools.definitions(),
        };
        debug!(
            agent = ctx.agent,
            step = ctx.step,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting model reply"
        );

        match self.provider.complete(request).await {
            Ok(ModelReply::Text(text)) => {
                info!(agent = ctx.agent, step = ctx.step, "Model replied with text");
                ctx.history.push(Message::assistant(text));
                self.pending.clear();
                Ok(false)
            }
            Ok(ModelReply::ToolCalls { thought, calls }) => {
                info!(
                    agent = ctx.agent,
                    step = ctx.step,
                    tool_calls = calls.len(),
                    "Model selected tools"
                );
                ctx.history
                    .push(Message::assistant_tool_calls(thought, calls.clone()));
                self.pending = calls;
                Ok(true)
            }
            Err(e) => {
                warn!(agent = ctx.agent, step = ctx.step, error = %e, "Model call failed");
                ctx.history
                    .push(Message::assistant(format!("Processing error: {e}")));
                self.pending.clear();
                Ok(false)
            }
        }
    }

    async fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        if self.pending.is_empty() {
            return Ok("No tools to call".into());
        }

        let calls = std::mem::take(&mut self.pending);
        let mut lines = Vec::with_capacity(calls.len());
        let mut terminate = false;

        for call in &calls {
            let started = Instant::now();
            let result = self.tools.invoke(call).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            info!(
                tool = %call.name,
                success = result.output.is_success(),
                duration_ms,
                "Tool executed"
            );
            if let Some(bus) = &self.event_bus {
                bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.output.is_success(),
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });
            }

            ctx.history.push(Message::from_tool_result(&result));
            lines.push(format!(
                "Tool [{}] result: {}",
                result.tool_name,
                result.output.text()
            ));
            terminate |= call.is_terminate();
        }

        if terminate {
            info!(agent = ctx.agent, step = ctx.step, "Terminate tool called, finishing run");
            ctx.request_finish();
        }

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StepStrategy;
    use crate::test_helpers::*;
    use stepwise_core::error::ProviderError;
    use stepwise_core::message::{Conversation, Role};

    fn agent(provider: Arc<ScriptedProvider>) -> ReAct<ToolCallAgent> {
        ToolCallAgent::new(provider, Arc::new(test_registry())).into_strategy()
    }

    async fn step(
        strategy: &mut ReAct<ToolCallAgent>,
        history: &mut Conversation,
        hint: Option<&str>,
    ) -> crate::strategy::StepOutcome {
        let mut ctx = StepContext::new("test", 1, "be brief", hint, history);
        strategy.step(&mut ctx).await.unwrap()
    }

    #[tokio::test]
    async fn text_reply_needs_no_action() {
        let provider = Arc::new(ScriptedProvider::always_text("Paris"));
        let mut strategy = agent(provider.clone());
        let mut history = Conversation::new();
        history.push(Message::user("Capital of France?"));

        let outcome = step(&mut strategy, &mut history, None).await;
        assert_eq!(outcome.description, "Thinking complete - no action needed");
        assert!(outcome.should_continue);
        assert_eq!(history.last_assistant().unwrap().text(), "Paris");

        let requests = provider.requests();
        assert_eq!(requests[0].system_prompt, "be brief");
        assert_eq!(requests[0].tools.len(), 3);
    }

    #[tokio::test]
    async fn hint_is_appended_before_request() {
        let provider = Arc::new(ScriptedProvider::always_text("ok"));
        let mut strategy = agent(provider.clone());
        let mut history = Conversation::new();
        history.push(Message::user("hi"));

        step(&mut strategy, &mut history, Some("Use tools if needed.")).await;
        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.last().unwrap().role, Role::User);
        assert_eq!(sent.last().unwrap().text(), "Use tools if needed.");

        // Blank hints are skipped
        step(&mut strategy, &mut history, Some("   ")).await;
        let sent = &provider.requests()[1].messages;
        assert_eq!(sent.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn tool_calls_run_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(vec![
            ToolCall::new("c1", "echo", serde_json::json!({ "text": "first" })),
            ToolCall::new("c2", "echo", serde_json::json!({ "text": "second" })),
        ])]));
        let mut strategy = agent(provider);
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        let outcome = step(&mut strategy, &mut history, None).await;
        assert_eq!(
            outcome.description,
            "Tool [echo] result: first\nTool [echo] result: second"
        );
        assert!(outcome.should_continue);

        let tool_messages: Vec<_> = history
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("c2"));
        assert!(strategy.inner().pending().is_empty());
    }

    #[tokio::test]
    async fn panicking_tool_does_not_abort_siblings() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(vec![
            call("c1", "explode"),
            ToolCall::new("c2", "echo", serde_json::json!({ "text": "still here" })),
        ])]));
        let mut strategy = agent(provider);
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        let outcome = step(&mut strategy, &mut history, None).await;
        let lines: Vec<&str> = outcome.description.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Tool [explode] result: Error: "));
        assert!(lines[0].contains("tool blew up"));
        assert_eq!(lines[1], "Tool [echo] result: still here");
        assert_eq!(history.count_role(Role::Tool), 2);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(vec![call(
            "c1", "missing",
        )])]));
        let mut strategy = agent(provider);
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        let outcome = step(&mut strategy, &mut history, None).await;
        assert_eq!(
            outcome.description,
            "Tool [missing] result: Error: Tool not found: missing"
        );
    }

    #[tokio::test]
    async fn terminate_finishes_after_whole_batch() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(vec![
            call("c1", "terminate"),
            ToolCall::new("c2", "echo", serde_json::json!({ "text": "after" })),
        ])]));
        let mut strategy = agent(provider);
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        let outcome = step(&mut strategy, &mut history, None).await;
        assert!(!outcome.should_continue);
        assert!(outcome.description.ends_with("Tool [echo] result: after"));
        assert_eq!(history.count_role(Role::Tool), 2);
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_and_not_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]));
        let mut strategy = agent(provider);
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        let outcome = step(&mut strategy, &mut history, None).await;
        assert_eq!(outcome.description, "Thinking complete - no action needed");
        let reply = history.last_assistant().unwrap().text();
        assert!(reply.starts_with("Processing error: "));
        assert!(reply.contains("connection refused"));
    }

    #[tokio::test]
    async fn act_without_pending_calls() {
        let provider = Arc::new(ScriptedProvider::always_text("x"));
        let mut inner = ToolCallAgent::new(provider, Arc::new(test_registry()));
        let mut history = Conversation::new();
        let mut ctx = StepContext::new("test", 1, "", None, &mut history);
        assert_eq!(inner.act(&mut ctx).await.unwrap(), "No tools to call");
    }

    #[tokio::test]
    async fn tool_events_are_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(vec![call("c1", "echo")])]));
        let mut strategy = ToolCallAgent::new(provider, Arc::new(test_registry()))
            .with_event_bus(bus)
            .into_strategy();
        let mut history = Conversation::new();
        history.push(Message::user("go"));

        step(&mut strategy, &mut history, None).await;
        let event = rx.try_recv().unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted {
                tool_name, success, ..
            } => {
                assert_eq!(tool_name, "echo");
                assert!(*success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
