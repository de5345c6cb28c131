//! The live workspace the project states are synchronized with.
//!
//! The workspace is shared with the user's own editor and tools, so
//! implementations must never cache listings: every call reflects the disk as
//! it is right now.

use crate::error::{StateError, StateResult};
use async_trait::async_trait;
use glob::Pattern;
use pilot_util::path::{normalize_relative, relative_posix};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files larger than this are not tracked by default.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50_000;

/// Names never tracked by default. Includes the project config files, which
/// belong to the user rather than to project history.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".pilot",
    "pilot.json",
    "pilot.jsonc",
    ".idea",
    ".vscode",
    ".DS_Store",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    "dist",
    "build",
    "target",
    "*.log",
];

/// Access to the files of a workspace.
///
/// Paths are workspace-relative POSIX strings.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// List every tracked file with its current content.
    async fn list(&self) -> StateResult<BTreeMap<String, String>>;

    /// Read one file. Returns `None` if it does not exist or is not tracked.
    async fn read(&self, path: &str) -> StateResult<Option<String>>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &str, content: &str) -> StateResult<()>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> StateResult<()>;

    /// Whether a file with this path and content would show up in [`list`].
    ///
    /// Stored files the workspace does not track are left out of
    /// reconciliation.
    ///
    /// [`list`]: Workspace::list
    fn tracks(&self, _path: &str, _content: &str) -> bool {
        true
    }

    /// Whether the workspace holds no tracked files.
    async fn is_empty(&self) -> StateResult<bool> {
        Ok(self.list().await?.is_empty())
    }
}

/// A shared workspace for dynamic dispatch.
pub type BoxedWorkspace = Arc<dyn Workspace>;

/// Which files a [`LocalWorkspace`] tracks.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
    max_file_size: u64,
}

impl IgnoreRules {
    /// Build rules from glob patterns. Invalid patterns are skipped.
    pub fn new<I, S>(patterns: I, max_file_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| match Pattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p.as_ref(), error = %e, "Ignoring invalid ignore pattern");
                    None
                }
            })
            .collect();

        Self {
            patterns,
            max_file_size,
        }
    }

    /// Add more patterns on top of the existing ones.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = Self::new(patterns, self.max_file_size);
        self.patterns.extend(extra.patterns);
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Whether a single path component (file or directory name) is ignored.
    pub fn ignores_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    /// Whether a workspace-relative path is ignored, by any component or whole.
    pub fn ignores_path(&self, path: &str) -> bool {
        path.split('/').any(|part| self.ignores_name(part))
            || self.patterns.iter().any(|p| p.matches(path))
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE.iter().copied(), DEFAULT_MAX_FILE_SIZE)
    }
}

/// A workspace rooted in a directory on the local disk.
///
/// Ignored paths, files above the size limit and files that are not valid
/// UTF-8 are invisible: they are never listed, so they are neither imported
/// nor deleted by a restore.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
    rules: IgnoreRules,
}

impl LocalWorkspace {
    /// Create a workspace with the default ignore rules.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_rules(root, IgnoreRules::default())
    }

    pub fn with_rules(root: impl Into<PathBuf>, rules: IgnoreRules) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute one below the root.
    fn resolve(&self, path: &str) -> StateResult<(String, PathBuf)> {
        let normalized =
            normalize_relative(path).ok_or_else(|| StateError::InvalidPath(path.to_string()))?;
        let full = normalized
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part));
        Ok((normalized, full))
    }

    /// Remove directories left empty by a delete, up to (not including) the root.
    async fn prune_empty_dirs(&self, mut dir: Option<&Path>) {
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(current).await.is_err() {
                break;
            }
            debug!(dir = %current.display(), "Removed empty directory");
            dir = current.parent();
        }
    }
}

fn scan(root: &Path, rules: &IgnoreRules) -> StateResult<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();

    if !root.exists() {
        return Ok(files);
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !rules.ignores_name(name))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string());
            StateError::workspace_io(path, io::Error::from(e))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative) = relative_posix(entry.path(), root) else {
            debug!(path = %entry.path().display(), "Skipping non-UTF-8 path");
            continue;
        };
        if rules.ignores_path(&relative) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| StateError::workspace_io(&relative, io::Error::from(e)))?;
        if metadata.len() > rules.max_file_size() {
            debug!(path = %relative, size = metadata.len(), "Skipping oversized file");
            continue;
        }

        let bytes =
            std::fs::read(entry.path()).map_err(|e| StateError::workspace_io(&relative, e))?;
        match String::from_utf8(bytes) {
            Ok(content) => {
                files.insert(relative, content);
            }
            Err(_) => debug!(path = %relative, "Skipping binary file"),
        }
    }

    Ok(files)
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn list(&self) -> StateResult<BTreeMap<String, String>> {
        let root = self.root.clone();
        let rules = self.rules.clone();

        tokio::task::spawn_blocking(move || scan(&root, &rules))
            .await
            .map_err(|e| StateError::workspace_io(self.root.display().to_string(), io::Error::other(e)))?
    }

    fn tracks(&self, path: &str, content: &str) -> bool {
        !self.rules.ignores_path(path) && content.len() as u64 <= self.rules.max_file_size()
    }

    async fn read(&self, path: &str) -> StateResult<Option<String>> {
        let (relative, full) = self.resolve(path)?;
        if self.rules.ignores_path(&relative) {
            return Ok(None);
        }

        match fs::read(&full).await {
            Ok(bytes) if bytes.len() as u64 <= self.rules.max_file_size() => {
                Ok(String::from_utf8(bytes).ok())
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::workspace_io(relative, e)),
        }
    }

    async fn write(&self, path: &str, content: &str) -> StateResult<()> {
        let (relative, full) = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::workspace_io(&relative, e))?;
        }
        fs::write(&full, content)
            .await
            .map_err(|e| StateError::workspace_io(&relative, e))?;

        debug!(path = %relative, bytes = content.len(), "Wrote workspace file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> StateResult<()> {
        let (relative, full) = self.resolve(path)?;

        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path = %relative, "Deleted workspace file");
                self.prune_empty_dirs(full.parent()).await;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::workspace_io(relative, e)),
        }
    }
}

/// A workspace held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    files: RwLock<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a workspace pre-populated with files.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            files: RwLock::new(
                files
                    .into_iter()
                    .map(|(p, c)| (p.into(), c.into()))
                    .collect(),
            ),
            read_only: AtomicBool::new(false),
        }
    }

    /// Make every write and delete fail with a permission error.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self, path: &str) -> StateResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StateError::workspace_io(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "workspace is read-only"),
            ));
        }
        Ok(())
    }

    fn normalize(path: &str) -> StateResult<String> {
        normalize_relative(path).ok_or_else(|| StateError::InvalidPath(path.to_string()))
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    async fn list(&self) -> StateResult<BTreeMap<String, String>> {
        Ok(self.files.read().await.clone())
    }

    async fn read(&self, path: &str) -> StateResult<Option<String>> {
        let path = Self::normalize(path)?;
        Ok(self.files.read().await.get(&path).cloned())
    }

    async fn write(&self, path: &str, content: &str) -> StateResult<()> {
        let path = Self::normalize(path)?;
        self.check_writable(&path)?;
        self.files.write().await.insert(path, content.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> StateResult<()> {
        let path = Self::normalize(path)?;
        self.check_writable(&path)?;
        self.files.write().await.remove(&path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_test_utils::TestProject;

    #[test]
    fn test_default_rules() {
        let rules = IgnoreRules::default();
        assert!(rules.ignores_name(".git"));
        assert!(rules.ignores_name("debug.log"));
        assert!(rules.ignores_name("pilot.jsonc"));
        assert!(DEFAULT_IGNORE.iter().all(|name| !name.contains("gpt")));
        assert!(rules.ignores_path("web/node_modules/react/index.js"));
        assert!(!rules.ignores_path("src/main.rs"));
    }

    #[test]
    fn test_extra_patterns() {
        let rules = IgnoreRules::default().with_patterns(["*.lock", "["]);
        assert!(rules.ignores_path("Cargo.lock"));
        assert!(!rules.ignores_path("Cargo.toml"));
    }

    #[tokio::test]
    async fn test_local_list_skips_ignored_binary_and_large_files() {
        let project = TestProject::new()
            .with_file("src/main.rs", "fn main() {}\n")
            .with_file("README.md", "# app\n")
            .with_file(".git/HEAD", "ref: refs/heads/main\n")
            .with_file("node_modules/x/index.js", "module.exports = 1;\n")
            .with_file("big.txt", "x".repeat(60_000))
            .with_bytes("logo.png", vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe])
            .build();

        let workspace = LocalWorkspace::new(project.path());
        let files = workspace.list().await.unwrap();

        let paths: Vec<&str> = files.keys().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/main.rs"]);
        assert_eq!(files["src/main.rs"], "fn main() {}\n");
    }

    #[tokio::test]
    async fn test_local_tracks_agrees_with_list() {
        let project = TestProject::new()
            .with_file("pilot.json", "{}")
            .with_file("build/index.js", "1;\n")
            .with_file("big.txt", "x".repeat(60_000))
            .with_file("app.js", "2;\n")
            .build();
        let workspace = LocalWorkspace::new(project.path());

        let files = workspace.list().await.unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["app.js"]);

        assert!(workspace.tracks("app.js", "2;\n"));
        assert!(!workspace.tracks("pilot.json", "{}"));
        assert!(!workspace.tracks("build/index.js", "1;\n"));
        assert!(!workspace.tracks("big.txt", &"x".repeat(60_000)));
        assert!(MemoryWorkspace::new().tracks("build/index.js", "1;\n"));
    }

    #[tokio::test]
    async fn test_local_missing_root_is_empty() {
        let project = TestProject::new().build();
        let workspace = LocalWorkspace::new(project.path().join("not-created-yet"));
        assert!(workspace.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_write_read_delete() {
        let project = TestProject::new().build();
        let workspace = LocalWorkspace::new(project.path());

        workspace.write("a/b/c.txt", "hello").await.unwrap();
        assert_eq!(workspace.read("a/b/c.txt").await.unwrap().as_deref(), Some("hello"));
        assert_eq!(project.read_file("a/b/c.txt"), "hello");

        workspace.delete("a/b/c.txt").await.unwrap();
        assert_eq!(workspace.read("a/b/c.txt").await.unwrap(), None);
        assert!(!project.path().join("a").exists(), "empty dirs are pruned");

        workspace.delete("a/b/c.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_escaping_paths() {
        let project = TestProject::new().build();
        let workspace = LocalWorkspace::new(project.path());

        let err = workspace.write("../outside.txt", "x").await.unwrap_err();
        assert!(matches!(err, StateError::InvalidPath(_)));
        let err = workspace.delete("/etc/hosts").await.unwrap_err();
        assert!(matches!(err, StateError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_memory_workspace() {
        let workspace = MemoryWorkspace::with_files([("b.txt", "2"), ("a.txt", "1")]);
        assert!(!workspace.is_empty().await.unwrap());

        workspace.write("./c.txt", "3").await.unwrap();
        workspace.delete("a.txt").await.unwrap();

        let files = workspace.list().await.unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["b.txt", "c.txt"]);

        workspace.set_read_only(true);
        let err = workspace.write("d.txt", "4").await.unwrap_err();
        assert!(err.is_workspace_error());
    }
}
