//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent runtime.
//! This crate has **no framework dependencies**: it defines the model that
//! the agent engine, the tools, and the provider adapters implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the agent engine is a trait here:
//! - [`Provider`] is the model gateway (history + tools in, text or tool calls out)
//! - [`Tool`] is one named, described capability; [`ToolRegistry`] holds them
//!
//! Implementations live in their own crates, so the engine can be driven by
//! scripted mocks in tests and by real adapters in production.

pub mod agent;
pub mod counter;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentState, RunConfig};
pub use counter::{CallCounter, RunCounters};
pub use error::{Error, ProviderError, Result, RunError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, Role};
pub use provider::{ModelReply, ModelRequest, Provider, ToolDefinition};
pub use tool::{TERMINATE_TOOL_NAME, Tool, ToolCall, ToolOutput, ToolRegistry, ToolResult};
