//! Model provider implementations for Stepwise.
//!
//! All providers implement the `stepwise_core::Provider` trait.
//! [`from_config`] builds the one selected by configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use stepwise_config::AppConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::provider::Provider;

/// Build the configured provider.
///
/// OpenAI and OpenRouter need an API key; Ollama and custom endpoints use
/// whatever key is set, or none.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let settings = &config.provider;
    let key = config.api_key.clone();
    let require_key = || {
        key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "{} needs an API key (set api_key or STEPWISE_API_KEY)",
                settings.kind
            ))
        })
    };

    let provider = match settings.kind.as_str() {
        "openai" => match &settings.base_url {
            Some(url) => OpenAiCompatProvider::new("openai", url, require_key()?, &settings.model)?,
            None => OpenAiCompatProvider::openai(require_key()?, &settings.model)?,
        },
        "openrouter" => match &settings.base_url {
            Some(url) => OpenAiCompatProvider::new("openrouter", url, require_key()?, &settings.model)?,
            None => OpenAiCompatProvider::openrouter(require_key()?, &settings.model)?,
        },
        "ollama" => OpenAiCompatProvider::ollama(settings.base_url.as_deref(), &settings.model)?,
        "custom" => {
            let url = settings.base_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("custom provider needs provider.base_url".into())
            })?;
            OpenAiCompatProvider::new("custom", url, key.clone().unwrap_or_default(), &settings.model)?
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider kind '{other}'"
            )));
        }
    };

    tracing::debug!(
        provider = %provider.name(),
        model = %provider.model(),
        base_url = %provider.base_url(),
        "Provider configured"
    );

    Ok(Arc::new(
        provider
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens),
    ))
}
