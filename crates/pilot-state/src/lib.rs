//! Versioned project state for pilot.
//!
//! This crate keeps an append-only history of project states and keeps it in
//! sync with a workspace the user is free to edit:
//! - Stage file writes and deletes, then commit them as a new state
//! - Detect how the workspace drifted from the current state
//! - Restore the workspace from the current state, or import it as a new one
//!
//! # Example
//!
//! ```no_run
//! use pilot_state::{LocalWorkspace, StateManager, StorageBackend};
//! use pilot_storage::JsonStorage;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Path::new("/project/root");
//! let backend = StorageBackend::new(Arc::new(JsonStorage::for_project(root)));
//! let workspace = LocalWorkspace::new(root);
//!
//! let sm = StateManager::load("my-app", Arc::new(backend), Arc::new(workspace)).await?;
//!
//! sm.save_file("src/main.py", "print('hello')\n").await?;
//! sm.commit().await?;
//!
//! // ... the user edits files ...
//!
//! if !sm.pending_changes().await?.is_empty() {
//!     sm.import_files().await?;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod content;
mod error;
mod manager;
pub mod reconcile;
mod state;
mod workspace;

pub use backend::{BoxedStateBackend, StateBackend, StorageBackend};
pub use content::{ContentId, FileContent};
pub use error::{StateError, StateResult};
pub use manager::{StagedChanges, StateManager};
pub use reconcile::{ChangeKind, ChangeSet, FileChange};
pub use state::{File, ProjectState, StateId, StateSummary};
pub use workspace::{
    BoxedWorkspace, IgnoreRules, LocalWorkspace, MemoryWorkspace, Workspace, DEFAULT_IGNORE,
    DEFAULT_MAX_FILE_SIZE,
};
