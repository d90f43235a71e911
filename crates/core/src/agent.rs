//! Agent configuration and state types.

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Lifecycle state of one agent run.
///
/// An agent is created `Idle`, becomes `Running` when a run starts and ends
/// in one of the two terminal states. Terminal agents are single-use: a new
/// run needs a freshly constructed agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    /// Whether the state can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Per-agent configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Name used in logs and events
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum number of steps per run (safety limit)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// How many earlier identical assistant replies mark the agent as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: u32,

    /// System prompt sent with every model request
    #[serde(default)]
    pub system_prompt: String,

    /// Hint appended as a user message before every model request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_name() -> String {
    "agent".into()
}
fn default_max_steps() -> u32 {
    10
}
fn default_duplicate_threshold() -> u32 {
    2
}

impl RunConfig {
    /// Check the limits that would make a run meaningless.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_steps == 0 {
            return Err(RunError::Misconfigured("max_steps must be at least 1".into()));
        }
        if self.duplicate_threshold == 0 {
            return Err(RunError::Misconfigured(
                "duplicate_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            system_prompt: String::new(),
            next_step_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_defaults_to_idle() {
        assert_eq!(AgentState::default(), AgentState::Idle);
        assert!(!AgentState::Idle.is_terminal());
        assert!(!AgentState::Running.is_terminal());
        assert!(AgentState::Finished.is_terminal());
        assert!(AgentState::Error.is_terminal());
    }

    #[test]
    fn run_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.duplicate_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limits_rejected() {
        let config = RunConfig {
            max_steps: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(RunError::Misconfigured(_))));

        let config = RunConfig {
            duplicate_threshold: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"name": "quiz", "max_steps": 15}"#).unwrap();
        assert_eq!(config.name, "quiz");
        assert_eq!(config.max_steps, 15);
        assert_eq!(config.duplicate_threshold, 2);
        assert!(config.next_step_prompt.is_none());
    }
}
