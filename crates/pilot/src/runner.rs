//! Runner module - wires configuration, storage and the state manager for one
//! project.

use anyhow::Context;
use pilot_core::{
    clients_from_configs, BoxedUi, Config, LlmProber, Orchestrator, StorageRequestLogger,
};
use pilot_provider::ProviderRegistry;
use pilot_state::{LocalWorkspace, StateManager, StorageBackend};
use pilot_storage::JsonStorage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the runner, taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Workspace root.
    pub root: PathBuf,
    /// Project id overriding the configured one.
    pub project: Option<String>,
    /// API key overriding every provider's key.
    pub api_key: Option<String>,
}

/// Everything needed to operate on one project.
pub struct Runner {
    config: Config,
    project_id: String,
    storage: Arc<JsonStorage>,
    state_manager: Arc<StateManager>,
    cancel: CancellationToken,
}

impl Runner {
    /// Load configuration and the project's current state.
    pub async fn new(runner_config: RunnerConfig) -> anyhow::Result<Self> {
        let root = runner_config.root;
        let (mut config, sources) = Config::load(Some(&root))
            .await
            .context("failed to load configuration")?;
        config.validate()?;
        if let Some(api_key) = &runner_config.api_key {
            config.override_api_key(api_key);
        }

        let project_id = runner_config
            .project
            .unwrap_or_else(|| config.project_id(&root));
        let storage = Arc::new(JsonStorage::for_project(&root));
        debug!(
            project_id = %project_id,
            root = %root.display(),
            storage = %storage.base_path().display(),
            config_sources = ?sources,
            "Opening project"
        );

        let backend = Arc::new(StorageBackend::new(storage.clone()));
        let workspace = Arc::new(LocalWorkspace::with_rules(&root, config.ignore_rules()));
        let state_manager = StateManager::load(&project_id, backend, workspace)
            .await
            .with_context(|| format!("failed to load project {project_id}"))?;

        info!(project_id = %project_id, "Project loaded");
        Ok(Self {
            config,
            project_id,
            storage,
            state_manager: Arc::new(state_manager),
            cancel: CancellationToken::new(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// Token cancelled on Ctrl-C.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A prober for every configured provider, logging to project storage.
    pub fn prober(&self) -> LlmProber {
        let registry = ProviderRegistry::with_defaults();
        let clients = clients_from_configs(&registry, &self.config.client_configs());
        let logger = Arc::new(StorageRequestLogger::new(self.storage.clone()));
        LlmProber::new(&self.project_id, clients, logger).with_timeout(self.config.probe_timeout())
    }

    pub fn orchestrator(&self, ui: BoxedUi) -> Orchestrator {
        Orchestrator::new(self.state_manager.clone(), ui, self.prober())
            .with_cancellation(self.cancel.clone())
    }

    /// Cancel pending questions when the user presses Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted");
                cancel.cancel();
            }
        });
    }
}
