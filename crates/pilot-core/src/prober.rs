//! LLM reachability preflight.
//!
//! Before a run starts, every configured provider gets one tiny completion.
//! The run may proceed only if all of them answer with some text in time.

use crate::request_log::{BoxedRequestLogger, LlmRequestLog, RequestStatus};
use async_trait::async_trait;
use futures::future::join_all;
use pilot_provider::{
    BoxedLlmClient, ClientConfig, Completion, CompletionRequest, LlmClient, ProviderError,
    ProviderRegistry, ProviderResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of probing one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub provider: String,
    pub model: String,
    pub status: RequestStatus,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Probes LLM providers for reachability.
///
/// Probing has no effect on project state and is safe to run repeatedly and
/// concurrently.
pub struct LlmProber {
    project_id: String,
    clients: Vec<BoxedLlmClient>,
    logger: BoxedRequestLogger,
    timeout: Duration,
}

impl LlmProber {
    pub fn new(
        project_id: impl Into<String>,
        clients: Vec<BoxedLlmClient>,
        logger: BoxedRequestLogger,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            clients,
            logger,
            timeout: crate::config::DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the per-provider timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of providers that will be probed.
    pub fn provider_count(&self) -> usize {
        self.clients.len()
    }

    /// Whether every configured provider answered with a non-empty
    /// completion. False when no provider is configured.
    pub async fn test_llm_access(&self) -> bool {
        if self.clients.is_empty() {
            warn!(project_id = %self.project_id, "No LLM provider configured");
            return false;
        }

        let results = self.probe_all().await;
        let ok = results.iter().all(ProbeResult::is_success);
        info!(
            project_id = %self.project_id,
            providers = results.len(),
            reachable = ok,
            "LLM access check finished"
        );
        ok
    }

    /// Probe every provider concurrently.
    pub async fn probe_all(&self) -> Vec<ProbeResult> {
        join_all(self.clients.iter().map(|client| self.probe(client.as_ref()))).await
    }

    async fn probe(&self, client: &dyn LlmClient) -> ProbeResult {
        let request = CompletionRequest::probe();
        let mut entry = LlmRequestLog::new(
            &self.project_id,
            client.provider_id(),
            client.model(),
            request.prompt_text(),
        );

        debug!(provider = %entry.provider, model = %entry.model, "Probing LLM");
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, client.complete(request)).await;
        let duration = started.elapsed();

        match outcome {
            Ok(Ok(completion)) if !completion.is_empty() => {
                entry.response = Some(completion.text);
            }
            Ok(Ok(completion)) => {
                entry.status = RequestStatus::Empty;
                entry.response = Some(completion.text);
                entry.error = Some("empty response".to_string());
            }
            Ok(Err(e)) => {
                entry.status = RequestStatus::Error;
                entry.error = Some(e.to_string());
            }
            Err(_) => {
                entry.status = RequestStatus::Timeout;
                entry.error = Some(ProviderError::Timeout(self.timeout).to_string());
            }
        }
        entry.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        if !entry.status.is_success() {
            warn!(
                provider = %entry.provider,
                model = %entry.model,
                status = ?entry.status,
                error = entry.error.as_deref().unwrap_or(""),
                "LLM probe failed"
            );
        }

        if let Err(e) = self.logger.log_llm_request(&entry).await {
            warn!(request_id = %entry.id, error = %e, "Failed to record LLM request");
        }

        ProbeResult {
            provider: entry.provider,
            model: entry.model,
            status: entry.status,
            error: entry.error,
            duration,
        }
    }
}

/// Build one client per configuration.
///
/// A configuration that cannot produce a client (unknown provider, missing
/// key) becomes a client that always fails, so it is reported by the probe
/// like any other unreachable provider.
pub fn clients_from_configs(
    registry: &ProviderRegistry,
    configs: &[ClientConfig],
) -> Vec<BoxedLlmClient> {
    configs
        .iter()
        .map(|config| match registry.create(config) {
            Ok(client) => client,
            Err(e) => {
                warn!(provider = %config.provider, error = %e, "Cannot create LLM client");
                Arc::new(UnavailableClient {
                    provider: config.provider.clone(),
                    model: config.model.clone(),
                    reason: e.to_string(),
                }) as BoxedLlmClient
            }
        })
        .collect()
}

struct UnavailableClient {
    provider: String,
    model: String,
    reason: String,
}

#[async_trait]
impl LlmClient for UnavailableClient {
    async fn complete(&self, _request: CompletionRequest) -> ProviderResult<Completion> {
        Err(ProviderError::internal(self.reason.clone()))
    }

    fn provider_id(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}
