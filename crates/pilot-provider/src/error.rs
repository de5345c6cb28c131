//! Provider error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while talking to an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The provider answered with something we could not understand.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No client is registered for a provider id.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Missing API key.
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// Invalid API key.
    #[error("Invalid API key for provider: {0}")]
    InvalidApiKey(String),

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The request did not finish in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Operation cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal provider error.
    #[error("Provider error: {message}")]
    Internal { message: String },

    /// API error with status code.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

impl ProviderError {
    /// Create an unknown provider error.
    pub fn unknown_provider(provider: impl Into<String>) -> Self {
        Self::UnknownProvider(provider.into())
    }

    /// Create a missing API key error.
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey(provider.into())
    }

    /// Create an invalid API key error.
    pub fn invalid_api_key(provider: impl Into<String>) -> Self {
        Self::InvalidApiKey(provider.into())
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::invalid_api_key(provider),
            429 => Self::RateLimited { retry_after: None },
            _ => Self::api_error(status, body),
        }
    }

    /// Short machine-readable label, used when recording failed requests.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RequestFailed(_) => "request_failed",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::UnknownProvider(_) => "unknown_provider",
            ProviderError::MissingApiKey(_) => "missing_api_key",
            ProviderError::InvalidApiKey(_) => "invalid_api_key",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Cancelled => "cancelled",
            ProviderError::Json(_) => "json",
            ProviderError::Internal { .. } => "internal",
            ProviderError::ApiError { .. } => "api_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ProviderError::from_status("openai", 401, String::new()),
            ProviderError::InvalidApiKey(p) if p == "openai"
        ));
        assert_eq!(
            ProviderError::from_status("openai", 429, String::new()).kind(),
            "rate_limited"
        );
        assert_eq!(
            ProviderError::from_status("openai", 500, "boom".into()).to_string(),
            "API error (500): boom"
        );
    }

    #[test]
    fn test_timeout_kind() {
        let err = ProviderError::Timeout(Duration::from_secs(5));
        assert_eq!(err.kind(), "timeout");
    }
}
