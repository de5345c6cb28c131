//! Startup coordination between the workspace, the state manager and the
//! user.

use crate::error::CoreResult;
use crate::prober::LlmProber;
use crate::ui::{BoxedUi, Question, Severity, UserInput};
use pilot_state::{ChangeSet, ProjectState, StateManager};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Button id that imports the workspace.
pub const IMPORT_BUTTON: &str = "yes";
/// Button id that restores the workspace.
pub const RESTORE_BUTTON: &str = "no";

/// What the offline-changes check did.
#[derive(Debug, Clone)]
pub enum OfflineCheck {
    /// The workspace already matched the current state.
    UpToDate,
    /// The workspace was overwritten from the current state; holds the
    /// changes that were undone.
    Restored(ChangeSet),
    /// The workspace was committed as this new state.
    Imported(Arc<ProjectState>),
}

impl OfflineCheck {
    fn describe(&self) -> String {
        match self {
            OfflineCheck::UpToDate => "Workspace is up to date.".to_string(),
            OfflineCheck::Restored(changes) if changes.is_empty() => {
                "Workspace restored, nothing to change.".to_string()
            }
            OfflineCheck::Restored(changes) => {
                format!("Workspace restored ({} undone).", changes.summary())
            }
            OfflineCheck::Imported(state) => format!(
                "Imported workspace as state {} ({} files).",
                state.id,
                state.files.len()
            ),
        }
    }
}

pub struct Orchestrator {
    state_manager: Arc<StateManager>,
    ui: BoxedUi,
    prober: LlmProber,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(state_manager: Arc<StateManager>, ui: BoxedUi, prober: LlmProber) -> Self {
        Self {
            state_manager,
            ui,
            prober,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts a pending question.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// Whether every configured LLM provider is reachable.
    pub async fn test_llm_access(&self) -> bool {
        self.prober.test_llm_access().await
    }

    /// Commit the workspace as it is on disk.
    pub async fn import_files(&self) -> CoreResult<Arc<ProjectState>> {
        Ok(self.state_manager.import_files().await?)
    }

    /// Reconcile edits made while pilot was not running.
    ///
    /// An empty workspace is restored from the current state. A workspace that
    /// differs from it is imported or restored depending on the user's
    /// answer; anything but an explicit import restores.
    pub async fn offline_changes_check(&self) -> CoreResult<OfflineCheck> {
        let outcome = if self.state_manager.workspace_is_empty().await? {
            info!(project_id = %self.state_manager.project_id(), "Workspace is empty, restoring");
            OfflineCheck::Restored(self.state_manager.restore_files().await?)
        } else {
            let pending = self.state_manager.pending_changes().await?;
            if pending.is_empty() {
                OfflineCheck::UpToDate
            } else if self.confirm_import(&pending).await {
                OfflineCheck::Imported(self.state_manager.import_files().await?)
            } else {
                OfflineCheck::Restored(self.state_manager.restore_files().await?)
            }
        };

        info!(
            project_id = %self.state_manager.project_id(),
            outcome = ?outcome_kind(&outcome),
            "Offline changes check finished"
        );
        self.ui.notify(&outcome.describe(), Severity::Info).await;
        Ok(outcome)
    }

    async fn confirm_import(&self, pending: &ChangeSet) -> bool {
        let question = Question::new(format!(
            "Files were changed while pilot was not running ({}):\n{}\
             Import these changes into the project, or restore the last saved state?",
            pending.summary(),
            pending
        ))
        .with_button(IMPORT_BUTTON, "Import changes")
        .with_button(RESTORE_BUTTON, "Restore")
        .with_default(IMPORT_BUTTON);

        let answer: CoreResult<UserInput> = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(UserInput::cancelled()),
            answer = self.ui.ask_question(&question) => answer,
        };

        match answer {
            Ok(input) => input.is_button(IMPORT_BUTTON),
            Err(e) => {
                warn!(error = %e, "Could not ask about offline changes, restoring");
                false
            }
        }
    }
}

fn outcome_kind(outcome: &OfflineCheck) -> &'static str {
    match outcome {
        OfflineCheck::UpToDate => "up_to_date",
        OfflineCheck::Restored(_) => "restored",
        OfflineCheck::Imported(_) => "imported",
    }
}
