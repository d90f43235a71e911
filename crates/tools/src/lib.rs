//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to act: stop the run, work with dates,
//! search the web, and read or write files inside a workspace directory.

pub mod date_time;
pub mod file_read;
pub mod file_write;
pub mod terminate;
pub mod web_search;
pub mod workspace;

use stepwise_config::AppConfig;
use stepwise_core::counter::RunCounters;
use stepwise_core::tool::ToolRegistry;

pub use workspace::Workspace;

/// Create a registry with every built-in tool.
///
/// `counters` is the run-scoped set shared with the agent: the web search
/// tool draws from it and the terminate tool resets it.
pub fn default_registry(config: &AppConfig, counters: &RunCounters) -> ToolRegistry {
    let workspace = Workspace::new(config.workspace_dir());

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(terminate::TerminateTool::new(counters.clone())));
    registry.register(Box::new(date_time::DateTimeTool));
    registry.register(Box::new(web_search::WebSearchTool::new(
        &config.tools.web_search,
        counters,
    )));
    registry.register(Box::new(file_read::FileReadTool::new(workspace.clone())));
    registry.register(Box::new(file_write::FileWriteTool::new(workspace)));

    tracing::debug!(tools = registry.len(), "Built default tool registry");
    registry
}
