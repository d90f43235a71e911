//! The step-driven agent runtime.
//!
//! A run goes like this:
//!
//! 1. **Receive** a user prompt and move from IDLE to RUNNING
//! 2. **Step**: the strategy thinks (one model call) and, if tools were
//!    chosen, acts (runs them in order and records the results)
//! 3. **Guard**: repeated replies put a corrective hint in front of the
//!    next request
//! 4. **Repeat** until the terminate tool is called, the step budget runs
//!    out, or something fails
//!
//! [`Agent::run`] collects one line per step; [`Agent::run_streaming`]
//! delivers the same lines as they happen.

pub mod loop_guard;
pub mod runner;
mod sink;
pub mod strategy;
pub mod stream;
pub mod stream_event;
pub mod tool_call;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_guard::{LoopGuard, STUCK_PROMPT};
pub use runner::{Agent, LOOP_NOTE};
pub use strategy::{ReAct, StepContext, StepOutcome, StepStrategy, ThinkAct};
pub use stream::{CompletionReason, RunStream, StreamOptions};
pub use stream_event::RunEvent;
pub use tool_call::ToolCallAgent;
