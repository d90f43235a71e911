//! The step-bounded agent runner.
//!
//! ```text
//!   IDLE ──run──▶ RUNNING ──┬─ strategy finished ─────▶ FINISHED
//!                           ├─ step budget exhausted ─▶ FINISHED
//!                           ├─ cancelled / dropped ───▶ FINISHED
//!                           └─ fault / idle / stall ──▶ ERROR
//! ```
//!
//! Each step is delegated to a [`StepStrategy`]. After every step the
//! [`LoopGuard`] checks the history for repeated replies. Whatever way the
//! run ends, the run-scoped counters are reset exactly once.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use stepwise_core::agent::{AgentState, RunConfig};
use stepwise_core::counter::RunCounters;
use stepwise_core::error::RunError;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::message::{Conversation, Message};
use stepwise_core::provider::Provider;
use stepwise_core::tool::{ToolRegistry, panic_message};
use tracing::{debug, error, info, warn};

use crate::loop_guard::LoopGuard;
use crate::sink::{CollectSink, Interrupt, OutcomeSink};
use crate::strategy::{ReAct, StepContext, StepOutcome, StepStrategy};
use crate::tool_call::ToolCallAgent;

/// Appended to a step line when the loop guard fired.
pub const LOOP_NOTE: &str = "Loop detected, corrective hint added";

/// A stateful agent that runs one task through a sequence of steps.
pub struct Agent<S> {
    config: RunConfig,
    state: AgentState,
    history: Conversation,
    next_step_prompt: Option<String>,
    strategy: S,
    guard: LoopGuard,
    counters: RunCounters,
    event_bus: Option<Arc<EventBus>>,
    current_step: u32,
}

impl Agent<ReAct<ToolCallAgent>> {
    /// An agent driven by the tool-calling strategy.
    ///
    /// `counters` must be the set the registry's tools were built with, so
    /// their limits are reset when the run ends.
    pub fn tool_calling(
        config: RunConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        counters: RunCounters,
    ) -> Result<Self, RunError> {
        Ok(Self::new(config, ToolCallAgent::new(provider, tools).into_strategy())?.with_counters(counters))
    }
}

impl<S: StepStrategy> Agent<S> {
    pub fn new(config: RunConfig, strategy: S) -> Result<Self, RunError> {
        config.validate()?;

        Ok(Self {
            guard: LoopGuard::new(config.duplicate_threshold),
            next_step_prompt: config.next_step_prompt.clone(),
            config,
            state: AgentState::Idle,
            history: Conversation::new(),
            strategy,
            counters: RunCounters::new(),
            event_bus: None,
            current_step: 0,
        })
    }

    /// Share run-scoped counters with the tools. They are reset when the run
    /// ends.
    pub fn with_counters(mut self, counters: RunCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// The current next-step hint, including any corrective prefixes.
    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt.as_deref()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Check that a run could start with `prompt`, without starting it.
    pub fn check_ready(&self, prompt: &str) -> Result<(), RunError> {
        if self.state != AgentState::Idle {
            return Err(RunError::InvalidState(self.state));
        }
        if prompt.trim().is_empty() {
            return Err(RunError::EmptyInput);
        }
        Ok(())
    }

    /// Run the task to completion and return one line per executed step.
    ///
    /// Fails without touching any state if the agent is not idle or the
    /// prompt is blank. Faults during the run are not errors here: the agent
    /// ends in [`AgentState::Error`] and the last line says what happened.
    pub async fn run(&mut self, prompt: &str) -> Result<Vec<String>, RunError> {
        self.begin(prompt)?;
        let mut sink = CollectSink::default();
        self.drive(&mut sink).await;
        Ok(sink.into_lines())
    }

    pub(crate) fn begin(&mut self, prompt: &str) -> Result<(), RunError> {
        self.check_ready(prompt)?;
        info!(
            agent = %self.config.name,
            max_steps = self.config.max_steps,
            "Starting run"
        );
        self.history.push(Message::user(prompt));
        self.transition(AgentState::Running);
        Ok(())
    }

    /// Execute steps until the run ends, delivering each line to `sink`.
    ///
    /// Returns the interrupt that cut the run short, if any.
    pub(crate) async fn drive<K: OutcomeSink>(&mut self, sink: &mut K) -> Option<Interrupt> {
        let mut interrupt = None;

        while self.state == AgentState::Running && self.current_step < self.config.max_steps {
            if let Some(reason) = sink.interrupted() {
                interrupt = Some(reason);
                break;
            }

            self.current_step += 1;
            let step = self.current_step;
            debug!(agent = %self.config.name, step, max_steps = self.config.max_steps, "Executing step");

            let result = self.execute_step(step).await;

            if let Some(reason) = sink.interrupted() {
                debug!(agent = %self.config.name, step, "Discarding outcome of interrupted step");
                interrupt = Some(reason);
                break;
            }

            match result {
                Ok(outcome) => {
                    let line = self.finish_step(step, outcome);
                    if let Err(reason) = sink.deliver_step(step, line).await {
                        interrupt = Some(reason);
                        break;
                    }
                }
                Err(reason) => {
                    error!(agent = %self.config.name, step, %reason, "Step failed, stopping run");
                    self.transition(AgentState::Error);
                    if let Err(sink_reason) = sink.deliver_error(format!("Execution error: {reason}")).await {
                        interrupt = Some(sink_reason);
                    }
                    break;
                }
            }
        }

        // A zero-step exit cannot happen with a validated config, but never
        // leave the agent running.
        if interrupt.is_none() && self.state == AgentState::Running {
            self.transition(AgentState::Finished);
        }

        if let Some(reason) = interrupt {
            warn!(agent = %self.config.name, ?reason, step = self.current_step, "Run interrupted");
            self.transition(reason.forced_state());
        } else if let Err(reason) = sink.finish(self.state, self.current_step).await {
            warn!(agent = %self.config.name, ?reason, "Final event not delivered");
            self.transition(reason.forced_state());
            interrupt = Some(reason);
        }

        self.cleanup();
        interrupt
    }

    /// Run one strategy step, turning errors and panics into a reason string.
    async fn execute_step(&mut self, step: u32) -> Result<StepOutcome, String> {
        let mut ctx = StepContext::new(
            &self.config.name,
            step,
            &self.config.system_prompt,
            self.next_step_prompt.as_deref(),
            &mut self.history,
        );

        let result = AssertUnwindSafe(self.strategy.step(&mut ctx))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(mut outcome)) => {
                if ctx.finish_requested() {
                    outcome.should_continue = false;
                }
                Ok(outcome)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("step panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    /// Apply a step outcome to the agent and build its line.
    fn finish_step(&mut self, step: u32, outcome: StepOutcome) -> String {
        let mut line = format!("Step {step}: {}", outcome.description);

        if !outcome.should_continue {
            self.transition(AgentState::Finished);
        }

        if self.guard.is_stuck(self.history.messages()) {
            self.guard.handle_stuck_state(&mut self.next_step_prompt);
            line.push_str("; ");
            line.push_str(LOOP_NOTE);
            self.publish(DomainEvent::LoopDetected {
                agent: self.config.name.clone(),
                step,
                timestamp: chrono::Utc::now(),
            });
        }

        if step >= self.config.max_steps && self.state == AgentState::Running {
            info!(agent = %self.config.name, max_steps = self.config.max_steps, "Step budget exhausted");
            line.push_str(&format!("; Terminated: reached max steps ({})", self.config.max_steps));
            self.transition(AgentState::Finished);
        }

        info!(agent = %self.config.name, step, outcome = %line, "Step completed");
        self.publish(DomainEvent::StepCompleted {
            agent: self.config.name.clone(),
            step,
            outcome: line.clone(),
            timestamp: chrono::Utc::now(),
        });
        line
    }

    fn transition(&mut self, to: AgentState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(agent = %self.config.name, %from, %to, "State changed");
        self.publish(DomainEvent::AgentStateChanged {
            agent: self.config.name.clone(),
            from,
            to,
            timestamp: chrono::Utc::now(),
        });
    }

    fn cleanup(&mut self) {
        self.counters.reset_all();
        info!(
            agent = %self.config.name,
            state = %self.state,
            steps = self.current_step,
            "Run ended"
        );
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
