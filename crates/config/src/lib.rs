//! Configuration loading, validation, and management for Stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stepwise_core::RunConfig;

/// Name of the profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "general";

const TERMINATE_HINT: &str = "Based on user needs, proactively select the most appropriate tool or combination of tools. \
For complex tasks, you can break down the problem and use different tools step by step to solve it. \
After using each tool, clearly explain the execution results and suggest the next steps. \
If you want to stop the interaction at any point, use the `terminate` tool/function call.";

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent runtime settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// User-defined agent profiles. Entries here shadow the built-in ones.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, RunConfig>,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("profiles", &self.profiles)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Which OpenAI-compatible endpoint to talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "openai", "openrouter", "ollama", or "custom"
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// Overrides the kind's default base URL (required for "custom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_kind() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Profile used by `stepwise run` when `--profile` is not given
    #[serde(default = "default_profile")]
    pub profile: String,

    /// How long a streaming consumer waits for the next event
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,

    /// Buffered outcome events between the run task and the consumer
    #[serde(default = "default_stream_channel_capacity")]
    pub stream_channel_capacity: usize,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.into()
}
fn default_stream_idle_timeout() -> u64 {
    300
}
fn default_stream_channel_capacity() -> usize {
    16
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
            stream_channel_capacity: default_stream_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root for file_read/file_write; defaults to `~/.stepwise/workspace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,

    #[serde(default)]
    pub web_search: WebSearchConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// SearchAPI-compatible search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Search engine passed to the endpoint
    #[serde(default = "default_search_engine")]
    pub engine: String,

    /// Searches allowed per run
    #[serde(default = "default_max_calls_per_run")]
    pub max_calls_per_run: u32,
}

fn default_search_endpoint() -> String {
    "https://www.searchapi.io/api/v1/search".into()
}
fn default_search_engine() -> String {
    "google".into()
}
fn default_max_calls_per_run() -> u32 {
    5
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            engine: default_search_engine(),
            max_calls_per_run: default_max_calls_per_run(),
        }
    }
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("engine", &self.engine)
            .field("max_calls_per_run", &self.max_calls_per_run)
            .finish()
    }
}

/// The profiles that ship with Stepwise.
pub fn builtin_profiles() -> BTreeMap<String, RunConfig> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "general".to_string(),
        RunConfig {
            name: "general".into(),
            max_steps: 20,
            duplicate_threshold: 2,
            system_prompt: "You are Stepwise, an all-capable AI assistant, aimed at solving any task presented by the user. \
You have various tools at your disposal that you can call upon to efficiently complete complex requests."
                .into(),
            next_step_prompt: Some(TERMINATE_HINT.into()),
        },
    );
    profiles.insert(
        "assessment".to_string(),
        RunConfig {
            name: "assessment".into(),
            max_steps: 15,
            duplicate_threshold: 3,
            system_prompt: "You are a professional assessment analysis assistant specialized in interpreting test results and providing personalized analysis. \
Your goal is to help users understand their assessment outcomes, analyze personal characteristics, \
and offer targeted recommendations and improvement strategies. \
Adapt your approach to the assessment type (personality, competency, emotional) and keep responses well-structured and easy to understand."
                .into(),
            next_step_prompt: Some(TERMINATE_HINT.into()),
        },
    );
    profiles
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwise/config.toml).
    ///
    /// Environment variables override the file:
    /// - `STEPWISE_API_KEY`, then `OPENAI_API_KEY` (only if no key in the file)
    /// - `STEPWISE_MODEL`
    /// - `STEPWISE_BASE_URL`
    /// - `SEARCHAPI_API_KEY` (only if no search key in the file)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply environment-style overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_empty("STEPWISE_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if let Some(model) = non_empty("STEPWISE_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = non_empty("STEPWISE_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if self.tools.web_search.api_key.is_none() {
            self.tools.web_search.api_key = non_empty("SEARCHAPI_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// The directory file tools are confined to.
    pub fn workspace_dir(&self) -> PathBuf {
        self.tools
            .workspace_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// Look up a profile by name; user profiles shadow built-in ones.
    pub fn profile(&self, name: &str) -> Result<RunConfig, ConfigError> {
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile.clone());
        }
        builtin_profiles()
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    /// All profile names, built-in and user-defined, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_profiles().into_keys().collect();
        for name in self.profiles.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(
            self.provider.kind.as_str(),
            "openai" | "openrouter" | "ollama" | "custom"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider.kind '{}'",
                self.provider.kind
            )));
        }

        if self.provider.kind == "custom" && self.provider.base_url.is_none() {
            return Err(ConfigError::ValidationError(
                "provider.base_url is required for a custom provider".into(),
            ));
        }

        if self.agent.stream_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.stream_idle_timeout_secs must be > 0".into(),
            ));
        }

        if self.agent.stream_channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "agent.stream_channel_capacity must be > 0".into(),
            ));
        }

        for (name, profile) in &self.profiles {
            profile
                .validate()
                .map_err(|e| ConfigError::ValidationError(format!("profile '{name}': {e}")))?;
        }

        self.profile(&self.agent.profile)?;
        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            profiles: BTreeMap::new(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown agent profile: {0}")]
    UnknownProfile(String),
}
