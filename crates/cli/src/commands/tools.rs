//! `stepwise tools`: list the built-in tools.

use stepwise_config::AppConfig;
use stepwise_core::counter::RunCounters;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = stepwise_tools::default_registry(&config, &RunCounters::new());

    println!("Built-in tools ({}):", registry.len());
    for def in registry.definitions() {
        println!();
        println!("  {}", def.name);
        println!("    {}", def.description);
        if let Some(props) = def.parameters["properties"].as_object() {
            if !props.is_empty() {
                let names: Vec<&str> = props.keys().map(String::as_str).collect();
                println!("    args: {}", names.join(", "));
            }
        }
    }

    println!();
    println!("Workspace:  {}", config.workspace_dir().display());
    let search = if config.tools.web_search.api_key.is_some() {
        format!(
            "enabled ({} calls per run)",
            config.tools.web_search.max_calls_per_run
        )
    } else {
        "no API key (set SEARCHAPI_API_KEY)".to_string()
    };
    println!("Web search: {search}");
    Ok(())
}
