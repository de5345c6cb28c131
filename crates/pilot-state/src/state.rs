//! Project state (snapshot) data structures.

use crate::content::FileContent;
use chrono::{DateTime, Utc};
use pilot_util::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a project state.
///
/// Ids are ascending ULIDs, so ordering two ids orders the states by creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Create a new state ID.
    pub fn new() -> Self {
        Self(Identifier::state())
    }

    /// Create a state ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file inside a project state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Workspace-relative POSIX path, unique within a state.
    pub path: String,
    /// The file's content.
    pub content: FileContent,
}

impl File {
    pub fn new(path: impl Into<String>, content: impl Into<FileContent>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// An immutable snapshot of the project's files.
///
/// Two states are the same state iff their ids match; use
/// [`ProjectState::same_files`] to compare content.
#[derive(Debug, Clone)]
pub struct ProjectState {
    /// Unique identifier for this state.
    pub id: StateId,

    /// The state this one was derived from (`None` for the root).
    pub parent_id: Option<StateId>,

    /// Files ordered by path.
    pub files: Vec<File>,

    /// When the state was created.
    pub created_at: DateTime<Utc>,
}

impl ProjectState {
    /// Create a new state from a path-keyed file map.
    ///
    /// Taking a map guarantees unique paths, and iterating it yields the files
    /// already ordered by path.
    pub fn new(parent_id: Option<StateId>, files: BTreeMap<String, FileContent>) -> Self {
        Self {
            id: StateId::new(),
            parent_id,
            files: files
                .into_iter()
                .map(|(path, content)| File { path, content })
                .collect(),
            created_at: Utc::now(),
        }
    }

    /// The empty state used before anything has been committed.
    pub fn initial() -> Self {
        Self::new(None, BTreeMap::new())
    }

    /// Look up a file by path.
    pub fn get(&self, path: &str) -> Option<&File> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    /// Check if this state includes a specific file.
    pub fn contains_file(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The files as a path-keyed map.
    pub fn file_map(&self) -> BTreeMap<String, FileContent> {
        self.files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect()
    }

    /// Whether two states hold exactly the same paths with the same content.
    pub fn same_files(&self, other: &ProjectState) -> bool {
        self.files == other.files
    }

    /// Short description for listings.
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            file_count: self.files.len(),
            created_at: self.created_at,
        }
    }
}

impl PartialEq for ProjectState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProjectState {}

/// Lightweight view of a persisted state, for history listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub id: StateId,
    pub parent_id: Option<StateId>,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
}
