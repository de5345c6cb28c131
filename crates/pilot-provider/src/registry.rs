//! Maps provider ids to client constructors.

use crate::anthropic::{AnthropicClient, ANTHROPIC_API_URL};
use crate::openai::{default_base_url, OpenAIClient};
use crate::{BoxedLlmClient, ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything needed to build a client for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Provider id, e.g. `"openai"` or `"anthropic"`.
    pub provider: String,
    /// Model id sent with every request.
    pub model: String,
    /// API key. Falls back to the `<PROVIDER>_API_KEY` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override of the provider's endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request HTTP timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Name of the environment variable holding this provider's key.
    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.provider.to_uppercase().replace('-', "_"))
    }

    /// The configured key, or the one from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(self.api_key_env()).ok())
            .filter(|k| !k.is_empty())
    }

    fn require_api_key(&self) -> ProviderResult<String> {
        self.resolve_api_key()
            .ok_or_else(|| ProviderError::missing_api_key(&self.provider))
    }
}

/// Builds a client from its configuration.
pub type ClientConstructor =
    Arc<dyn Fn(&ClientConfig) -> ProviderResult<BoxedLlmClient> + Send + Sync>;

/// Registry of known providers.
#[derive(Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ClientConstructor>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with Anthropic and the OpenAI-compatible providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register("anthropic", |config| {
            let api_key = config.require_api_key()?;
            let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);
            let client =
                AnthropicClient::with_base_url(&api_key, base_url, &config.model, config.timeout)?;
            Ok(Arc::new(client) as BoxedLlmClient)
        });

        for provider in [
            "openai",
            "groq",
            "openrouter",
            "deepinfra",
            "together",
            "mistral",
            "xai",
        ] {
            registry.register(provider, openai_compatible);
        }

        registry
    }

    /// Register (or replace) the constructor for a provider id.
    pub fn register<F>(&mut self, provider: impl Into<String>, constructor: F)
    where
        F: Fn(&ClientConfig) -> ProviderResult<BoxedLlmClient> + Send + Sync + 'static,
    {
        self.constructors
            .insert(provider.into(), Arc::new(constructor));
    }

    /// Whether a provider id is known.
    pub fn contains(&self, provider: &str) -> bool {
        self.constructors.contains_key(provider)
    }

    /// Registered provider ids, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.constructors.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Build a client.
    ///
    /// Unknown providers with an explicit `base_url` are treated as
    /// OpenAI-compatible.
    pub fn create(&self, config: &ClientConfig) -> ProviderResult<BoxedLlmClient> {
        debug!(provider = %config.provider, model = %config.model, "Creating LLM client");

        match self.constructors.get(&config.provider) {
            Some(constructor) => constructor(config),
            None if config.base_url.is_some() => openai_compatible(config),
            None => Err(ProviderError::unknown_provider(&config.provider)),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn openai_compatible(config: &ClientConfig) -> ProviderResult<BoxedLlmClient> {
    let base_url = config
        .base_url
        .as_deref()
        .or_else(|| default_base_url(&config.provider))
        .ok_or_else(|| ProviderError::unknown_provider(&config.provider))?;

    // Custom endpoints (local servers) may not need a key.
    let api_key = if config.base_url.is_some() {
        config.resolve_api_key().unwrap_or_default()
    } else {
        config.require_api_key()?
    };

    let client = OpenAIClient::for_provider(
        config.provider.clone(),
        &api_key,
        base_url,
        &config.model,
        config.timeout,
    )?;
    Ok(Arc::new(client) as BoxedLlmClient)
}
