//! Anthropic (Claude) client.

use crate::{
    error::ProviderError, Completion, CompletionRequest, LlmClient, ProviderResult, Role, Usage,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The Anthropic API base URL.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

/// The Anthropic API version.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the request does not set `max_tokens`, which the API requires.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a new Anthropic client with API key.
    pub fn new(api_key: &str, model: impl Into<String>) -> ProviderResult<Self> {
        Self::with_base_url(api_key, ANTHROPIC_API_URL, model, None)
    }

    /// Create a new Anthropic client with a custom base URL.
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> ProviderResult<Self> {
        let model = model.into();
        let mut headers = HeaderMap::new();

        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| ProviderError::invalid_api_key("anthropic"))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        debug!(model = %model, "Creating Anthropic client");

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
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Completion> {
        let (system, messages) = request.split_system();

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: request.temperature,
            messages: messages
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    content: &m.content,
                })
                .collect(),
        };

        debug!(
            model = %self.model,
            message_count = body.messages.len(),
            "Sending request to Anthropic"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&body)
            .send()
            .await?;

        info!(status = %response.status(), "Anthropic API response received");

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Anthropic request failed");
            return Err(ProviderError::from_status("anthropic", status.as_u16(), body));
        }

        let parsed: AnthropicResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(Completion {
            text,
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/response types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::with_base_url("test-key", &server.uri(), "claude-test", None).unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-test",
                "system": "Be brief.",
                "messages": [{"role": "user", "content": "ping"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "START"}],
                "usage": {"input_tokens": 12, "output_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CompletionRequest::new(vec![
            Message::system("Be brief."),
            Message::user("ping"),
        ]);
        let completion = client(&server).complete(request).await.unwrap();

        assert_eq!(completion.text, "START");
        assert_eq!(completion.usage.unwrap().output_tokens, 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let completion = client(&server)
            .complete(CompletionRequest::probe())
            .await
            .unwrap();
        assert!(completion.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(CompletionRequest::probe())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidApiKey(_)));
    }

    #[test]
    fn test_rejects_unusable_key() {
        let result = AnthropicClient::new("bad\nkey", "claude-test");
        assert!(matches!(result, Err(ProviderError::InvalidApiKey(_))));
    }
}
