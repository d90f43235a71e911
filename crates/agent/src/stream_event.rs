//! Events delivered to a streaming consumer.
//!
//! One `step` event per completed step, an `error` event when the run
//! faults (or the consumer's idle timer fires), and a final `done` event
//! carrying the terminal state.

use serde::{Deserialize, Serialize};
use stepwise_core::agent::AgentState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A step finished. `content` is the same line `run` would return.
    Step { step: u32, content: String },

    /// The run faulted or went silent.
    Error { message: String },

    /// The run ended.
    Done { state: AgentState, steps: u32 },
}

impl RunEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// The text a console consumer prints for this event.
    pub fn content(&self) -> String {
        match self {
            Self::Step { content, .. } => content.clone(),
            Self::Error { message } => message.clone(),
            Self::Done { state, steps } => format!("Run ended in state {state} after {steps} step(s)"),
        }
    }
}
