//! State error types.

use pilot_storage::StorageError;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while managing project states.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading, writing or deleting a workspace file failed.
    #[error("Workspace IO error on {path}: {source}")]
    WorkspaceIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisting a new snapshot failed; the current state was not advanced.
    #[error("Failed to persist project state: {0}")]
    StoreWrite(#[source] StorageError),

    /// Loading history from the backing store failed.
    #[error("Failed to read project state: {0}")]
    StoreRead(#[source] StorageError),

    /// A file path is empty, absolute or escapes the workspace.
    #[error("Invalid file path: {0:?}")]
    InvalidPath(String),

    /// Stored history references something that does not exist.
    #[error("Project state storage corrupted: {0}")]
    Corrupted(String),

    /// A file is not part of the requested state.
    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl StateError {
    /// Create a workspace IO error for the given path.
    pub fn workspace_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::WorkspaceIo {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupted storage error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Whether this error originates from the workspace (disk) side.
    pub fn is_workspace_error(&self) -> bool {
        matches!(self, Self::WorkspaceIo { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_io_names_the_path() {
        let err = StateError::workspace_io(
            "src/main.rs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_workspace_error());
        assert_eq!(
            err.to_string(),
            "Workspace IO error on src/main.rs: denied"
        );
    }

    #[test]
    fn store_write_keeps_storage_source() {
        let err = StateError::StoreWrite(StorageError::already_exists(&["state", "p", "sta_1"]));
        assert!(!err.is_workspace_error());
        assert!(std::error::Error::source(&err).is_some());
    }
}
