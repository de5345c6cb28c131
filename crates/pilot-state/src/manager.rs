//! The state manager: current state, staged changes and commits.

use crate::backend::BoxedStateBackend;
use crate::content::FileContent;
use crate::error::{StateError, StateResult};
use crate::reconcile::{reconcile, unified_diff, ChangeKind, ChangeSet};
use crate::state::{File, ProjectState, StateSummary};
use crate::workspace::BoxedWorkspace;
use pilot_util::path::normalize_relative;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Writes and deletes made since the last commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    writes: BTreeMap<String, FileContent>,
    deletes: BTreeSet<String>,
}

impl StagedChanges {
    /// Files created or overwritten, by path.
    pub fn writes(&self) -> &BTreeMap<String, FileContent> {
        &self.writes
    }

    /// Paths removed.
    pub fn deletes(&self) -> &BTreeSet<String> {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    fn apply(&self, files: &mut BTreeMap<String, FileContent>) {
        for path in &self.deletes {
            files.remove(path);
        }
        for (path, content) in &self.writes {
            files.insert(path.clone(), content.clone());
        }
    }
}

struct Inner {
    current: Arc<ProjectState>,
    /// Whether `current` exists in the backend (false for the initial state).
    persisted: bool,
    staged: Option<StagedChanges>,
}

/// Owns the current state of one project and keeps it in sync with the
/// workspace.
///
/// Mutating operations are serialized, so commits extend history in the
/// order they were called.
pub struct StateManager {
    project_id: String,
    backend: BoxedStateBackend,
    workspace: BoxedWorkspace,
    inner: Mutex<Inner>,
}

impl StateManager {
    /// Open a project, starting from its latest persisted state or from the
    /// empty initial state.
    pub async fn load(
        project_id: impl Into<String>,
        backend: BoxedStateBackend,
        workspace: BoxedWorkspace,
    ) -> StateResult<Self> {
        let project_id = project_id.into();

        let (current, persisted) = match backend.latest(&project_id).await? {
            Some(state) => {
                info!(
                    project_id = %project_id,
                    state_id = %state.id,
                    files = state.files.len(),
                    "Loaded project state"
                );
                (state, true)
            }
            None => {
                info!(project_id = %project_id, "Starting from empty project state");
                (ProjectState::initial(), false)
            }
        };

        Ok(Self {
            project_id,
            backend,
            workspace,
            inner: Mutex::new(Inner {
                current: Arc::new(current),
                persisted,
                staged: None,
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn normalize(path: &str) -> StateResult<String> {
        normalize_relative(path).ok_or_else(|| StateError::InvalidPath(path.to_string()))
    }

    /// Write a file to the workspace and stage it for the next commit.
    pub async fn save_file(&self, path: &str, content: impl Into<String>) -> StateResult<()> {
        let path = Self::normalize(path)?;
        let content: String = content.into();

        let mut inner = self.inner.lock().await;
        self.workspace.write(&path, &content).await?;

        let staged = inner.staged.get_or_insert_with(StagedChanges::default);
        staged.deletes.remove(&path);
        staged.writes.insert(path.clone(), FileContent::new(content));

        debug!(project_id = %self.project_id, path = %path, "Staged file write");
        Ok(())
    }

    /// Delete a file from the workspace and stage its removal.
    ///
    /// Removing a path that is neither in the current state nor staged does
    /// nothing.
    pub async fn remove_file(&self, path: &str) -> StateResult<()> {
        let path = Self::normalize(path)?;

        let mut inner = self.inner.lock().await;
        let tracked = inner.current.contains_file(&path);
        let staged_write = inner
            .staged
            .as_ref()
            .is_some_and(|s| s.writes.contains_key(&path));

        if !tracked && !staged_write {
            debug!(project_id = %self.project_id, path = %path, "Ignoring removal of untracked file");
            return Ok(());
        }

        self.workspace.delete(&path).await?;

        let staged = inner.staged.get_or_insert_with(StagedChanges::default);
        staged.writes.remove(&path);
        if tracked {
            staged.deletes.insert(path.clone());
        }

        debug!(project_id = %self.project_id, path = %path, "Staged file removal");
        Ok(())
    }

    /// Turn the staged changes into a new state and make it current.
    ///
    /// A commit with nothing staged still creates a new state holding the
    /// same files. If persisting fails, the current state and the staged
    /// changes are left as they were.
    pub async fn commit(&self) -> StateResult<Arc<ProjectState>> {
        let mut inner = self.inner.lock().await;

        let mut files = inner.current.file_map();
        if let Some(staged) = &inner.staged {
            staged.apply(&mut files);
        }

        self.persist(&mut inner, files).await
    }

    async fn persist(
        &self,
        inner: &mut Inner,
        files: BTreeMap<String, FileContent>,
    ) -> StateResult<Arc<ProjectState>> {
        let parent_id = inner.persisted.then(|| inner.current.id.clone());
        let state = ProjectState::new(parent_id, files);

        self.backend.append(&self.project_id, &state).await?;

        let state = Arc::new(state);
        inner.current = state.clone();
        inner.persisted = true;
        inner.staged = None;

        info!(
            project_id = %self.project_id,
            state_id = %state.id,
            files = state.files.len(),
            "Committed project state"
        );
        Ok(state)
    }

    /// The current state.
    pub async fn current_state(&self) -> Arc<ProjectState> {
        self.inner.lock().await.current.clone()
    }

    /// Whether the workspace currently holds no tracked files.
    pub async fn workspace_is_empty(&self) -> StateResult<bool> {
        self.workspace.is_empty().await
    }

    /// Split the files of `state` into those the workspace can see and those
    /// its rules hide (ignored or oversized).
    ///
    /// A hidden file that is nevertheless listed counts as visible, so an
    /// edit that brings it back under the rules is still reconciled.
    fn split_visible(
        &self,
        state: &ProjectState,
        listing: &BTreeMap<String, String>,
    ) -> (Vec<File>, Vec<File>) {
        state.files.iter().cloned().partition(|file| {
            listing.contains_key(&file.path)
                || self.workspace.tracks(&file.path, file.content.content())
        })
    }

    /// Make the workspace match the current state exactly.
    ///
    /// Files that differ or are missing are written, files the state does not
    /// know about are deleted. Stored files the workspace rules hide are left
    /// alone. Staged changes are discarded. Returns the differences that were
    /// undone.
    pub async fn restore_files(&self) -> StateResult<ChangeSet> {
        let mut inner = self.inner.lock().await;
        let listing = self.workspace.list().await?;
        let (visible, _) = self.split_visible(&inner.current, &listing);
        let changes = reconcile(&visible, &listing).changes;

        for change in &changes.changes {
            match change.kind {
                ChangeKind::Added => self.workspace.delete(&change.path).await?,
                ChangeKind::Modified | ChangeKind::Deleted => {
                    let file = inner
                        .current
                        .get(&change.path)
                        .ok_or_else(|| StateError::FileNotFound(change.path.clone()))?;
                    self.workspace
                        .write(&change.path, file.content.content())
                        .await?;
                }
            }
        }

        if inner.staged.take().is_some_and(|s| !s.is_empty()) {
            warn!(project_id = %self.project_id, "Discarded staged changes while restoring");
        }

        info!(
            project_id = %self.project_id,
            state_id = %inner.current.id,
            changes = %changes.summary(),
            "Restored workspace from project state"
        );
        Ok(changes)
    }

    /// Commit the workspace as it is on disk as a new state.
    ///
    /// Staged changes are superseded by the disk contents. Stored files the
    /// workspace rules hide are carried over unchanged.
    pub async fn import_files(&self) -> StateResult<Arc<ProjectState>> {
        Ok(self.import_changes().await?.0)
    }

    /// Like [`import_files`](Self::import_files), also returning how the
    /// imported state differs from the previous one.
    pub async fn import_changes(&self) -> StateResult<(Arc<ProjectState>, ChangeSet)> {
        let mut inner = self.inner.lock().await;
        let listing = self.workspace.list().await?;
        let (visible, hidden) = self.split_visible(&inner.current, &listing);
        let mut reconciliation = reconcile(&visible, &listing);

        if inner.staged.as_ref().is_some_and(|s| !s.is_empty()) {
            warn!(project_id = %self.project_id, "Staged changes superseded by import");
        }

        info!(
            project_id = %self.project_id,
            changes = %reconciliation.changes.summary(),
            unchanged = reconciliation.changes.unchanged,
            hidden = hidden.len(),
            "Importing workspace"
        );

        for file in hidden {
            reconciliation.files.insert(file.path, file.content);
        }

        let state = self.persist(&mut inner, reconciliation.files).await?;
        Ok((state, reconciliation.changes))
    }

    /// How the workspace differs from the current state, without committing.
    pub async fn pending_changes(&self) -> StateResult<ChangeSet> {
        let current = self.current_state().await;
        let listing = self.workspace.list().await?;
        let (visible, _) = self.split_visible(&current, &listing);
        Ok(reconcile(&visible, &listing).changes)
    }

    /// A copy of the changes staged since the last commit.
    pub async fn staged_changes(&self) -> StagedChanges {
        self.inner
            .lock()
            .await
            .staged
            .clone()
            .unwrap_or_default()
    }

    /// Summaries of all persisted states, oldest first.
    pub async fn history(&self) -> StateResult<Vec<StateSummary>> {
        self.backend.history(&self.project_id).await
    }

    /// Unified diff from the current state's version of a file to the
    /// workspace version.
    pub async fn diff(&self, path: &str) -> StateResult<String> {
        let path = Self::normalize(path)?;
        let current = self.current_state().await;

        let stored = current.get(&path).map(|f| f.content.content().to_string());
        let disk = self.workspace.read(&path).await?;
        if stored.is_none() && disk.is_none() {
            return Err(StateError::FileNotFound(path));
        }

        Ok(unified_diff(
            stored.as_deref().unwrap_or_default(),
            disk.as_deref().unwrap_or_default(),
            &path,
        ))
    }
}
