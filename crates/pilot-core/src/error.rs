//! Error types for the core crate.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Project state error.
    #[error("state error: {0}")]
    State(#[from] pilot_state::StateError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] pilot_storage::StorageError),

    /// LLM provider error.
    #[error("provider error: {0}")]
    Provider(#[from] pilot_provider::ProviderError),

    /// The UI could not deliver a question or its answer.
    #[error("ui error: {0}")]
    Ui(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a UI error.
    pub fn ui(message: impl Into<String>) -> Self {
        Self::Ui(message.into())
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },
}

impl ConfigError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
