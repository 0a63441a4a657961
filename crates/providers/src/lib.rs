//! Model provider implementations for Parley.
//!
//! All providers implement the `parley_core::Provider` trait.
//! [`build_from_config`] picks the configured default provider.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use parley_config::AppConfig;
use parley_core::error::ProviderError;
use parley_core::provider::Provider;
use std::sync::Arc;

/// Build the default provider from configuration.
///
/// A `[providers.<name>]` section may override the API key and base URL;
/// well-known provider names fall back to their public endpoints.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}': set providers.{name}.api_url"
            ))
        })?;

    tracing::debug!(provider = name, base_url = %base_url, "Building provider");

    Ok(Arc::new(OpenAiCompatProvider::with_timeout(
        name,
        base_url,
        api_key,
        config.orchestration.model_timeout(),
    )))
}

/// The model to request: the provider section's override, else the default.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
