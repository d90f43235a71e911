//! The single-step protocol.
//!
//! A [`StepStrategy`] advances the agent by exactly one step. [`ReAct`]
//! builds a strategy out of any [`ThinkAct`] pair: think decides whether an
//! action is needed, act performs it.

use async_trait::async_trait;
use stepwise_core::Result;
use stepwise_core::message::Conversation;
use tracing::warn;

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Human-readable summary of the step
    pub description: String,

    /// False once the step asked the run to stop
    pub should_continue: bool,
}

impl StepOutcome {
    pub fn proceed(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            should_continue: true,
        }
    }

    pub fn finish(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            should_continue: false,
        }
    }
}

/// Everything a step may read or change.
///
/// History is append-only through [`Conversation::push`]. The runner owns
/// it and lends it out for the duration of one step.
pub struct StepContext<'a> {
    pub agent: &'a str,
    pub step: u32,
    pub system_prompt: &'a str,
    pub next_step_prompt: Option<&'a str>,
    pub history: &'a mut Conversation,
    finish_requested: bool,
}

impl<'a> StepContext<'a> {
    pub fn new(
        agent: &'a str,
        step: u32,
        system_prompt: &'a str,
        next_step_prompt: Option<&'a str>,
        history: &'a mut Conversation,
    ) -> Self {
        Self {
            agent,
            step,
            system_prompt,
            next_step_prompt,
            history,
            finish_requested: false,
        }
    }

    /// Ask the runner to finish after this step.
    pub fn request_finish(&mut self) {
        self.finish_requested = true;
    }

    pub fn finish_requested(&self) -> bool {
        self.finish_requested
    }
}

/// One state transition of the agent.
///
/// An `Err` (or a panic) escaping `step` is treated by the runner as an
/// unrecoverable fault and moves the agent to the error state.
#[async_trait]
pub trait StepStrategy: Send {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome>;
}

/// A think/act pair.
#[async_trait]
pub trait ThinkAct: Send {
    /// Decide whether an action is needed. May append to history.
    async fn think(&mut self, ctx: &mut StepContext<'_>) -> Result<bool>;

    /// Perform the action decided by `think` and summarize it.
    async fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<String>;
}

/// Adapts a [`ThinkAct`] pair into a [`StepStrategy`].
///
/// Errors from think or act are recovered into a "Step failed" outcome.
pub struct ReAct<T> {
    inner: T,
}

impl<T> ReAct<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[async_trait]
impl<T: ThinkAct> StepStrategy for ReAct<T> {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let description = match self.inner.think(ctx).await {
            Ok(false) => "Thinking complete - no action needed".to_string(),
            Ok(true) => match self.inner.act(ctx).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(agent = ctx.agent, step = ctx.step, error = %e, "Act failed");
                    format!("Step failed: {e}")
                }
            },
            Err(e) => {
                warn!(agent = ctx.agent, step = ctx.step, error = %e, "Think failed");
                format!("Step failed: {e}")
            }
        };

        Ok(if ctx.finish_requested() {
            StepOutcome::finish(description)
        } else {
            StepOutcome::proceed(description)
        })
    }
}
