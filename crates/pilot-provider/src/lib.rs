//! LLM client abstraction for pilot.
//!
//! This crate provides a single request/response interface over the LLM
//! providers pilot talks to:
//! - Anthropic (Claude)
//! - OpenAI
//! - OpenAI-compatible endpoints (Groq, OpenRouter, local servers, ...)

pub mod anthropic;
pub mod error;
pub mod message;
pub mod openai;
pub mod registry;

pub use error::{ProviderError, ProviderResult};
pub use message::{Message, Role};
pub use registry::{ClientConfig, ProviderRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prompt sent to check that a provider is reachable.
pub const PROBE_PROMPT: &str =
    "This is a connection test. If you can see this, please respond only with 'START' and nothing else.";

/// A single non-streaming completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation so far. System messages are merged into the system prompt.
    pub messages: Vec<Message>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0-1.0).
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// The minimal request used to probe a provider.
    pub fn probe() -> Self {
        Self {
            messages: vec![Message::user(PROBE_PROMPT)],
            max_tokens: Some(16),
            temperature: Some(0.0),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The prompt as plain text, for request logs.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}] {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// System messages joined into one prompt, plus the remaining messages.
    pub fn split_system(&self) -> (Option<String>, Vec<&Message>) {
        let mut system: Option<String> = None;
        let mut rest = Vec::new();

        for message in &self.messages {
            if message.role == Role::System {
                system = Some(match system {
                    None => message.content.clone(),
                    Some(existing) => format!("{existing}\n\n{}", message.content),
                });
            } else {
                rest.push(message);
            }
        }

        (system, rest)
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The provider's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text; empty if the model returned nothing.
    pub text: String,
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// True when the model produced no visible text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A client bound to one provider and model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Completion>;

    /// The provider ID (e.g., "anthropic", "openai").
    fn provider_id(&self) -> &str;

    /// The model requests are sent to.
    fn model(&self) -> &str;
}

/// A boxed LLM client for dynamic dispatch.
pub type BoxedLlmClient = Arc<dyn LlmClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_request() {
        let request = CompletionRequest::probe();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.messages[0].content.contains("START"));
    }

    #[test]
    fn test_split_system() {
        let request = CompletionRequest::new(vec![
            Message::system("Be brief."),
            Message::user("hi"),
            Message::system("Answer in English."),
        ]);
        let (system, rest) = request.split_system();
        assert_eq!(system.as_deref(), Some("Be brief.\n\nAnswer in English."));
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_prompt_text() {
        let request = CompletionRequest::new(vec![Message::user("hello")]);
        assert_eq!(request.prompt_text(), "[user] hello");
    }

    #[test]
    fn test_whitespace_completion_is_empty() {
        assert!(Completion::text(" \n").is_empty());
        assert!(!Completion::text("START").is_empty());
    }
}
