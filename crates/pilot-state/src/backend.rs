//! Persistence of project states.
//!
//! Storage layout:
//! ```text
//! content/<sha256>            deduplicated file content
//! state/<project>/<state id>  state record: path -> content id
//! head/<project>              the current state of the project
//! ```

use crate::content::{ContentId, FileContent};
use crate::error::{StateError, StateResult};
use crate::state::{File, ProjectState, StateId, StateSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pilot_storage::{Storage, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable history of project states.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Persist `state` and make it the project's current state.
    ///
    /// Either both happen or neither does.
    async fn append(&self, project_id: &str, state: &ProjectState) -> StateResult<()>;

    /// The project's current state, if anything was ever committed.
    async fn latest(&self, project_id: &str) -> StateResult<Option<ProjectState>>;

    /// Load one state by id.
    async fn get(&self, project_id: &str, id: &StateId) -> StateResult<Option<ProjectState>>;

    /// Summaries of every persisted state, oldest first.
    async fn history(&self, project_id: &str) -> StateResult<Vec<StateSummary>>;
}

/// A shared backend for dynamic dispatch.
pub type BoxedStateBackend = Arc<dyn StateBackend>;

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    id: StateId,
    parent_id: Option<StateId>,
    created_at: DateTime<Utc>,
    files: BTreeMap<String, ContentId>,
}

impl StateRecord {
    fn summary(&self) -> StateSummary {
        StateSummary {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            file_count: self.files.len(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HeadRecord {
    state_id: StateId,
    updated_at: DateTime<Utc>,
}

/// [`StateBackend`] over a key-value [`Storage`].
///
/// Nothing is cached between calls; file content read back is only shared
/// within the state it was loaded for.
pub struct StorageBackend<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> StorageBackend<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    async fn store_content(&self, content: &FileContent) -> Result<(), StorageError> {
        let key = ["content", content.id().as_str()];
        if self.storage.exists(&key).await? {
            return Ok(());
        }
        self.storage.write(&key, &content.content()).await
    }

    async fn load_content(&self, id: &ContentId) -> StateResult<FileContent> {
        let text: String = self
            .storage
            .read(&["content", id.as_str()])
            .await
            .map_err(StateError::StoreRead)?
            .ok_or_else(|| StateError::corrupted(format!("missing content {id}")))?;

        let content = FileContent::new(text);
        if content.id() != id {
            return Err(StateError::corrupted(format!(
                "content {id} does not match its digest"
            )));
        }
        Ok(content)
    }

    async fn read_record(&self, project_id: &str, id: &StateId) -> StateResult<Option<StateRecord>> {
        self.storage
            .read(&["state", project_id, id.as_str()])
            .await
            .map_err(StateError::StoreRead)
    }

    async fn materialize(&self, record: StateRecord) -> StateResult<ProjectState> {
        let mut loaded: HashMap<ContentId, FileContent> = HashMap::new();
        let mut files = Vec::with_capacity(record.files.len());
        for (path, content_id) in record.files {
            let content = match loaded.get(&content_id) {
                Some(content) => content.clone(),
                None => {
                    let content = self.load_content(&content_id).await?;
                    loaded.insert(content_id, content.clone());
                    content
                }
            };
            files.push(File { path, content });
        }

        Ok(ProjectState {
            id: record.id,
            parent_id: record.parent_id,
            files,
            created_at: record.created_at,
        })
    }
}

#[async_trait]
impl<S: Storage + 'static> StateBackend for StorageBackend<S> {
    async fn append(&self, project_id: &str, state: &ProjectState) -> StateResult<()> {
        if let Some(parent) = &state.parent_id {
            if self.read_record(project_id, parent).await?.is_none() {
                return Err(StateError::corrupted(format!(
                    "parent state {parent} does not exist"
                )));
            }
        }

        for file in &state.files {
            self.store_content(&file.content)
                .await
                .map_err(StateError::StoreWrite)?;
        }

        let record = StateRecord {
            id: state.id.clone(),
            parent_id: state.parent_id.clone(),
            created_at: state.created_at,
            files: state
                .files
                .iter()
                .map(|f| (f.path.clone(), f.content.id().clone()))
                .collect(),
        };
        let record_key = ["state", project_id, state.id.as_str()];
        self.storage
            .create(&record_key, &record)
            .await
            .map_err(StateError::StoreWrite)?;

        let head = HeadRecord {
            state_id: state.id.clone(),
            updated_at: Utc::now(),
        };
        if let Err(e) = self.storage.write(&["head", project_id], &head).await {
            // The record is not reachable from the head; drop it so history
            // stays consistent with what was committed.
            if let Err(cleanup) = self.storage.remove(&record_key).await {
                warn!(
                    project_id = %project_id,
                    state_id = %state.id,
                    error = %cleanup,
                    "Failed to remove orphaned state record"
                );
            }
            return Err(StateError::StoreWrite(e));
        }

        info!(
            project_id = %project_id,
            state_id = %state.id,
            files = state.files.len(),
            "Persisted project state"
        );
        Ok(())
    }

    async fn latest(&self, project_id: &str) -> StateResult<Option<ProjectState>> {
        let head: Option<HeadRecord> = self
            .storage
            .read(&["head", project_id])
            .await
            .map_err(StateError::StoreRead)?;

        let Some(head) = head else {
            debug!(project_id = %project_id, "No persisted state");
            return Ok(None);
        };

        match self.get(project_id, &head.state_id).await? {
            Some(state) => Ok(Some(state)),
            None => Err(StateError::corrupted(format!(
                "head of {project_id} points to missing state {}",
                head.state_id
            ))),
        }
    }

    async fn get(&self, project_id: &str, id: &StateId) -> StateResult<Option<ProjectState>> {
        match self.read_record(project_id, id).await? {
            Some(record) => self.materialize(record).await.map(Some),
            None => Ok(None),
        }
    }

    async fn history(&self, project_id: &str) -> StateResult<Vec<StateSummary>> {
        let keys = self
            .storage
            .list(&["state", project_id])
            .await
            .map_err(StateError::StoreRead)?;

        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(id) = key.last() else { continue };
            let id = StateId::from_string(id.clone());
            match self.read_record(project_id, &id).await? {
                Some(record) => summaries.push(record.summary()),
                None => warn!(project_id = %project_id, state_id = %id, "State vanished while listing"),
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_storage::{JsonStorage, MemoryStorage};

    fn state(parent: Option<&ProjectState>, entries: &[(&str, &str)]) -> ProjectState {
        ProjectState::new(
            parent.map(|p| p.id.clone()),
            entries
                .iter()
                .map(|(p, c)| (p.to_string(), FileContent::new(*c)))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_project_has_no_latest() {
        let backend = StorageBackend::new(Arc::new(MemoryStorage::new()));
        assert!(backend.latest("app").await.unwrap().is_none());
        assert!(backend.history("app").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_advances_head() {
        let backend = StorageBackend::new(Arc::new(MemoryStorage::new()));
        let first = state(None, &[("a.txt", "1")]);
        let second = state(Some(&first), &[("a.txt", "1"), ("b.txt", "2")]);

        backend.append("app", &first).await.unwrap();
        backend.append("app", &second).await.unwrap();

        let latest = backend.latest("app").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.parent_id.as_ref(), Some(&first.id));
        assert!(latest.same_files(&second));

        let history = backend.history("app").await.unwrap();
        let ids: Vec<_> = history.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![first.id.clone(), second.id.clone()]);
    }

    #[tokio::test]
    async fn test_content_is_deduplicated() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = StorageBackend::new(storage.clone());

        let first = state(None, &[("a.txt", "same"), ("b.txt", "same")]);
        backend.append("app", &first).await.unwrap();
        let second = state(Some(&first), &[("c.txt", "same")]);
        backend.append("app", &second).await.unwrap();

        let contents = storage.list(&["content"]).await.unwrap();
        assert_eq!(contents.len(), 1);
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let backend = StorageBackend::new(Arc::new(MemoryStorage::new()));
        backend.append("one", &state(None, &[("a", "1")])).await.unwrap();

        assert!(backend.latest("two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_append_is_rejected() {
        let backend = StorageBackend::new(Arc::new(MemoryStorage::new()));
        let first = state(None, &[("a", "1")]);
        backend.append("app", &first).await.unwrap();

        let err = backend.append("app", &first).await.unwrap_err();
        assert!(matches!(err, StateError::StoreWrite(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_unknown_parent_is_rejected() {
        let backend = StorageBackend::new(Arc::new(MemoryStorage::new()));
        let orphan = ProjectState::new(Some(StateId::new()), BTreeMap::new());

        let err = backend.append("app", &orphan).await.unwrap_err();
        assert!(matches!(err, StateError::Corrupted(_)));
        assert!(backend.latest("app").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_content_is_corruption() {
        let storage = Arc::new(MemoryStorage::new());
        let first = state(None, &[("a.txt", "1")]);
        StorageBackend::new(storage.clone())
            .append("app", &first)
            .await
            .unwrap();

        let id = first.files[0].content.id().clone();
        storage.remove(&["content", id.as_str()]).await.unwrap();

        let fresh = StorageBackend::new(storage);
        let err = fresh.latest("app").await.unwrap_err();
        assert!(matches!(err, StateError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_loaded_content_is_not_retained() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = StorageBackend::new(storage.clone());
        let first = state(None, &[("a.txt", "same"), ("b.txt", "same")]);
        backend.append("app", &first).await.unwrap();

        let loaded = backend.latest("app").await.unwrap().unwrap();
        let (a, b) = (&loaded.files[0].content, &loaded.files[1].content);
        assert!(std::ptr::eq(a.content().as_ptr(), b.content().as_ptr()));

        storage.remove(&["content", a.id().as_str()]).await.unwrap();
        let err = backend.latest("app").await.unwrap_err();
        assert!(matches!(err, StateError::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let first = state(None, &[("src/main.rs", "fn main() {}\n")]);

        {
            let backend = StorageBackend::new(Arc::new(JsonStorage::new(dir.path())));
            backend.append("app", &first).await.unwrap();
        }

        let backend = StorageBackend::new(Arc::new(JsonStorage::new(dir.path())));
        let latest = backend.latest("app").await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert_eq!(latest.get("src/main.rs").unwrap().content, "fn main() {}\n");
    }
}
