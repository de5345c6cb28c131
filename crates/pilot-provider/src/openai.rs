//! OpenAI and OpenAI-compatible chat completions client.
//!
//! Any endpoint speaking the `/chat/completions` protocol works by pointing
//! `base_url` at it; [`OpenAIClient::for_provider`] knows the well-known ones.

use crate::{error::ProviderError, Completion, CompletionRequest, LlmClient, ProviderResult, Usage};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The OpenAI API base URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Base URLs of OpenAI-compatible providers.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(OPENAI_API_URL),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "deepinfra" => Some("https://api.deepinfra.com/v1/openai"),
        "together" => Some("https://api.together.xyz/v1"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "xai" => Some("https://api.x.ai/v1"),
        _ => None,
    }
}

/// Client for the chat completions API.
pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    provider_id: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client with API key.
    pub fn new(api_key: &str, model: impl Into<String>) -> ProviderResult<Self> {
        Self::for_provider("openai", api_key, OPENAI_API_URL, model, None)
    }

    /// Create a client for an OpenAI-compatible provider.
    ///
    /// An empty `api_key` sends no authorization header, for local servers.
    pub fn for_provider(
        provider_id: impl Into<String>,
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> ProviderResult<Self> {
        let provider_id = provider_id.into();
        let model = model.into();
        let mut headers = HeaderMap::new();

        if !api_key.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|_| ProviderError::invalid_api_key(&provider_id))?,
            );
        }

        debug!(provider = %provider_id, model = %model, base_url = %base_url, "Creating OpenAI-compatible client");

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            provider_id,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Completion> {
        let body = ChatRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            provider = %self.provider_id,
            model = %self.model,
            message_count = body.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        info!(provider = %self.provider_id, status = %response.status(), "Chat completion response received");

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.provider_id, status = %status, body = %body, "Chat completion failed");
            return Err(ProviderError::from_status(
                &self.provider_id,
                status.as_u16(),
                body,
            ));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response("response has no choices"))?;

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
