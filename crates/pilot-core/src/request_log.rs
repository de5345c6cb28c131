//! Records of LLM requests.

use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pilot_storage::Storage;
use pilot_util::Identifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Success,
    /// The provider answered without any text.
    Empty,
    Error,
    Timeout,
}

impl RequestStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestStatus::Success)
    }
}

/// One LLM request, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmRequestLog {
    pub id: String,
    pub project_id: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl LlmRequestLog {
    /// Start a record for a request sent now.
    pub fn new(
        project_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: Identifier::request(),
            project_id: project_id.into(),
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            response: None,
            status: RequestStatus::Success,
            error: None,
            duration_ms: 0,
            started_at: Utc::now(),
        }
    }
}

/// Sink for request records.
#[async_trait]
pub trait RequestLogger: Send + Sync {
    async fn log_llm_request(&self, entry: &LlmRequestLog) -> CoreResult<()>;
}

/// A shared request logger for dynamic dispatch.
pub type BoxedRequestLogger = Arc<dyn RequestLogger>;

/// Persists records under `llm_request/<project>/<id>`.
pub struct StorageRequestLogger<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> StorageRequestLogger<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// All records of a project, oldest first.
    pub async fn list(&self, project_id: &str) -> CoreResult<Vec<LlmRequestLog>> {
        let keys = self.storage.list(&["llm_request", project_id]).await?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let key: Vec<&str> = key.iter().map(|s| s.as_str()).collect();
            if let Some(entry) = self.storage.read::<LlmRequestLog>(&key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl<S: Storage + 'static> RequestLogger for StorageRequestLogger<S> {
    async fn log_llm_request(&self, entry: &LlmRequestLog) -> CoreResult<()> {
        self.storage
            .create(
                &["llm_request", entry.project_id.as_str(), entry.id.as_str()],
                entry,
            )
            .await?;
        Ok(())
    }
}

/// Emits records as log events only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogger;

#[async_trait]
impl RequestLogger for TracingRequestLogger {
    async fn log_llm_request(&self, entry: &LlmRequestLog) -> CoreResult<()> {
        if entry.status.is_success() {
            info!(
                request_id = %entry.id,
                provider = %entry.provider,
                model = %entry.model,
                duration_ms = entry.duration_ms,
                "LLM request succeeded"
            );
        } else {
            warn!(
                request_id = %entry.id,
                provider = %entry.provider,
                model = %entry.model,
                status = ?entry.status,
                error = entry.error.as_deref().unwrap_or(""),
                duration_ms = entry.duration_ms,
                "LLM request failed"
            );
        }
        Ok(())
    }
}
