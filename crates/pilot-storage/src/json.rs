//! JSON file-based storage implementation.
//!
//! This storage backend stores each key as a separate JSON file.
//! Keys are mapped to file paths: `["state", "my-app", "sta_01h"]` -> `state/my-app/sta_01h.json`
//!
//! Every write goes to a uniquely named temp file that is flushed to disk before
//! it is moved into place, so a reader never observes a half-written value.

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// JSON file-based storage.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    /// Create a new JSON storage at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Storage rooted in the project-local pilot directory (`<root>/.pilot/storage`).
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(pilot_util::path::project_dir(project_root).join("storage"))
    }

    /// The directory this storage writes into.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a key.
    fn key_to_path(&self, key: &[&str]) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("Key cannot be empty"));
        }

        // No path traversal through key components
        for component in key {
            if component.is_empty()
                || component.contains('/')
                || component.contains('\\')
                || *component == "."
                || *component == ".."
            {
                return Err(StorageError::invalid_key(format!(
                    "Invalid key component: {component}"
                )));
            }
        }

        let mut path = self.base_path.clone();
        for component in key {
            path.push(component);
        }
        path.set_extension("json");

        Ok(path)
    }

    /// Get the directory path for a prefix.
    fn prefix_to_dir(&self, prefix: &[&str]) -> PathBuf {
        let mut path = self.base_path.clone();
        for component in prefix {
            path.push(component);
        }
        path
    }

    /// Serialize `value` into a synced temp file next to `path`.
    async fn write_temp<T: Serialize + Sync>(path: &Path, value: &T) -> StorageResult<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(value)?;
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;

        Ok(temp_path)
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Reading from storage");

        match fs::read(&path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Writing to storage");

        let temp_path = Self::write_temp(&path, value).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn create<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Creating storage record");

        let temp_path = Self::write_temp(&path, value).await?;

        // hard_link refuses to replace an existing file, unlike rename
        let linked = fs::hard_link(&temp_path, &path).await;
        let _ = fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::already_exists(key))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Removing from storage");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        let dir = self.prefix_to_dir(prefix);
        debug!(path = %dir.display(), "Listing storage");

        let mut results = Vec::new();

        match fs::read_dir(&dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();

                    // Only include .json files; temp files end in .tmp
                    if path.extension().is_some_and(|ext| ext == "json") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            let mut key: Vec<String> =
                                prefix.iter().map(|s| s.to_string()).collect();
                            key.push(stem.to_string());
                            results.push(key);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }

        results.sort();
        Ok(results)
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Head {
        current: String,
    }

    fn head(id: &str) -> Head {
        Head {
            current: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage.write(&["head", "app"], &head("sta_1")).await.unwrap();

        let read: Option<Head> = storage.read(&["head", "app"]).await.unwrap();
        assert_eq!(read, Some(head("sta_1")));
        assert!(dir.path().join("head/app.json").exists());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        let read: Option<Head> = storage.read(&["nonexistent"]).await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage.write(&["head", "app"], &head("sta_1")).await.unwrap();
        storage.write(&["head", "app"], &head("sta_2")).await.unwrap();

        let read: Option<Head> = storage.read(&["head", "app"]).await.unwrap();
        assert_eq!(read.unwrap().current, "sta_2");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("head"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_create_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage
            .create(&["state", "app", "sta_1"], &head("first"))
            .await
            .unwrap();
        let err = storage
            .create(&["state", "app", "sta_1"], &head("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let read: Option<Head> = storage.read(&["state", "app", "sta_1"]).await.unwrap();
        assert_eq!(read.unwrap().current, "first");
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage.write(&["head", "app"], &head("sta_1")).await.unwrap();
        assert!(storage.exists(&["head", "app"]).await.unwrap());

        storage.remove(&["head", "app"]).await.unwrap();
        assert!(!storage.exists(&["head", "app"]).await.unwrap());

        // Removing again is fine
        storage.remove(&["head", "app"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        for id in ["sta_3", "sta_1", "sta_2"] {
            storage.create(&["state", "app", id], &head(id)).await.unwrap();
        }

        let items = storage.list(&["state", "app"]).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|k| k[2].as_str()).collect();
        assert_eq!(ids, vec!["sta_1", "sta_2", "sta_3"]);

        let missing = storage.list(&["state", "other"]).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());
        let value = head("x");

        assert!(storage.write(&[], &value).await.is_err());
        assert!(storage
            .write(&["..", "etc", "passwd"], &value)
            .await
            .is_err());
        assert!(storage.write(&["path/traversal"], &value).await.is_err());
    }

    #[test]
    fn test_for_project_lives_under_pilot_dir() {
        let storage = JsonStorage::for_project(Path::new("/work/app"));
        assert_eq!(storage.base_path(), Path::new("/work/app/.pilot/storage"));
    }
}
