//! `stepwise config`: configuration inspection.

use stepwise_config::AppConfig;

/// Print the effective configuration with secrets removed.
pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", render_redacted(&config)?);

    println!("# profiles: {}", config.profile_names().join(", "));
    println!(
        "# api key: {}",
        if config.has_api_key() { "set" } else { "not set" }
    );
    Ok(())
}

pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    shown.api_key = None;
    shown.tools.web_search.api_key = None;
    toml::to_string_pretty(&shown)
}
