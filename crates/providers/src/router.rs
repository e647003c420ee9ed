//! Provider router — selects the correct LLM provider based on config and
//! assembles the retry / concurrency-limit stack around it.

use crate::limiter::ConcurrencyLimitedProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;
use sleuth_config::AppConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

}

/// Build every configured provider, wrapped in retry and a shared
/// concurrency limit. Providers that need a key and have none are skipped.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);
    let permits = Arc::new(tokio::sync::Semaphore::new(
        config.runtime.max_concurrent_requests.max(1),
    ));

    let mut names: Vec<&str> = config.providers.keys().map(String::as_str).collect();
    if !names.contains(&config.default_provider.as_str()) {
        names.push(&config.default_provider);
    }

    for name in names {
        match build_raw(config, name) {
            Ok(raw) => {
                let stacked = wrap(config, raw, permits.clone());
                router.register(name, stacked);
            }
            Err(e) => tracing::debug!(provider = name, error = %e, "Skipping provider"),
        }
    }

    router
}

/// Build the default provider stack, failing if it cannot be configured.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    build_from_config(config).default().ok_or_else(|| {
        match build_raw(config, &config.default_provider) {
            Err(e) => e,
            Ok(_) => ProviderError::NotConfigured(config.default_provider.clone()),
        }
    })
}

fn wrap(
    config: &AppConfig,
    raw: Arc<dyn Provider>,
    permits: Arc<tokio::sync::Semaphore>,
) -> Arc<dyn Provider> {
    let retrying = RetryProvider::new(raw)
        .with_max_retries(config.runtime.max_retries)
        .with_backoff(Duration::from_millis(config.runtime.retry_backoff_ms))
        .with_attempt_timeout(Duration::from_secs(config.runtime.request_timeout_secs));
    Arc::new(ConcurrencyLimitedProvider::with_semaphore(
        Arc::new(retrying),
        permits,
    ))
}

fn build_raw(config: &AppConfig, name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name).map(String::from))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{name}' has no api_url and no well-known endpoint"
            ))
        })?;

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());

    let api_key = match api_key {
        Some(key) => key,
        None if is_local(name) => name.to_string(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}'; set SLEUTH_API_KEY or OPENAI_API_KEY"
            )));
        }
    };

    Ok(Arc::new(OpenAiCompatProvider::with_timeout(
        name,
        base_url,
        api_key,
        Duration::from_secs(config.runtime.request_timeout_secs),
    )))
}

/// Providers served from localhost that accept any key.
fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url)
}
