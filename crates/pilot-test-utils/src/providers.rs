//! Scripted LLM clients.
//!
//! Provides clients that record requests and return configurable responses.

use async_trait::async_trait;
use pilot_provider::{
    Completion, CompletionRequest, LlmClient, ProviderError, ProviderResult,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A response that the client can return.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return a text completion.
    Text(String),
    /// Return a completion with no text.
    Empty,
    /// Fail with a provider error carrying this message.
    Error(String),
    /// Return a text completion after a delay.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
}

impl Default for ScriptedResponse {
    fn default() -> Self {
        ScriptedResponse::Text("Test response".to_string())
    }
}

/// A client that records every request and replays scripted responses.
///
/// Clones share the same script and recorded calls, so a test can keep one
/// handle while handing another to the code under test.
///
/// # Example
///
/// ```rust,ignore
/// use pilot_test_utils::providers::ScriptedClient;
///
/// let client = ScriptedClient::new().with_response("START");
///
/// // Use client in test...
///
/// assert_eq!(client.call_count(), 1);
/// ```
#[derive(Clone)]
pub struct ScriptedClient {
    provider_id: String,
    model: String,
    /// Recorded calls to complete().
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Queue of responses to return.
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    /// Response when the queue is empty.
    default_response: Arc<Mutex<ScriptedResponse>>,
}

impl ScriptedClient {
    /// Create a new scripted client.
    pub fn new() -> Self {
        Self {
            provider_id: "scripted".to_string(),
            model: "scripted-model".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: Arc::new(Mutex::new(ScriptedResponse::default())),
        }
    }

    /// Set the provider and model reported by the client.
    pub fn named(mut self, provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self.model = model.into();
        self
    }

    /// Queue a response.
    pub fn with(self, response: ScriptedResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Queue a text response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with(ScriptedResponse::Text(text.into()))
    }

    /// Queue an empty response.
    pub fn with_empty_response(self) -> Self {
        self.with(ScriptedResponse::Empty)
    }

    /// Queue an error response.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.with(ScriptedResponse::Error(message.into()))
    }

    /// Queue a request that never completes.
    pub fn with_hang(self) -> Self {
        self.with(ScriptedResponse::Hang)
    }

    /// Set the response used once the queue is exhausted.
    pub fn with_default_response(self, response: ScriptedResponse) -> Self {
        *self.default_response.lock().unwrap() = response;
        self
    }

    /// Get all recorded requests.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Check if any request contained the given text.
    pub fn was_sent(&self, text: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|request| request.messages.iter().any(|m| m.content.contains(text)))
    }

    fn next_response(&self) -> ScriptedResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Completion> {
        self.calls.lock().unwrap().push(request);

        match self.next_response() {
            ScriptedResponse::Text(text) => Ok(Completion::text(text)),
            ScriptedResponse::Empty => Ok(Completion::default()),
            ScriptedResponse::Error(message) => Err(ProviderError::internal(message)),
            ScriptedResponse::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(Completion::text(text))
            }
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}
