//! Where step lines go.
//!
//! A blocking run collects lines into a vector. A streaming run pushes them
//! through a bounded channel and can be interrupted from the consumer side.

use async_trait::async_trait;
use stepwise_core::agent::AgentState;

/// Why a run stopped before its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    Disconnected,
    TimedOut,
    ConsumerStalled,
}

impl Interrupt {
    /// The state a run is forced into.
    pub(crate) fn forced_state(self) -> AgentState {
        match self {
            Self::Cancelled | Self::Disconnected => AgentState::Finished,
            Self::TimedOut | Self::ConsumerStalled => AgentState::Error,
        }
    }
}

#[async_trait]
pub(crate) trait OutcomeSink: Send {
    /// Checked at every step boundary.
    fn interrupted(&self) -> Option<Interrupt>;

    async fn deliver_step(&mut self, step: u32, line: String) -> Result<(), Interrupt>;

    async fn deliver_error(&mut self, message: String) -> Result<(), Interrupt>;

    /// Called once when the run ends on its own.
    async fn finish(&mut self, state: AgentState, steps: u32) -> Result<(), Interrupt>;
}

/// Collects lines in order. Never interrupts.
#[derive(Debug, Default)]
pub(crate) struct CollectSink {
    lines: Vec<String>,
}

impl CollectSink {
    pub(crate) fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

#[async_trait]
impl OutcomeSink for CollectSink {
    fn interrupted(&self) -> Option<Interrupt> {
        None
    }

    async fn deliver_step(&mut self, _step: u32, line: String) -> Result<(), Interrupt> {
        self.lines.push(line);
        Ok(())
    }

    async fn deliver_error(&mut self, message: String) -> Result<(), Interrupt> {
        self.lines.push(message);
        Ok(())
    }

    async fn finish(&mut self, _state: AgentState, _steps: u32) -> Result<(), Interrupt> {
        Ok(())
    }
}
