//! Temporary project directories for tests.
//!
//! A [`TestProject`] describes a file layout; [`TestProject::build`] writes it
//! into a fresh temporary directory that is removed when the
//! [`BuiltTestProject`] is dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a temporary project.
///
/// # Example
///
/// ```rust
/// use pilot_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("app.py", "print('hello')\n")
///     .with_config(r#"{"project": "demo"}"#)
///     .build();
///
/// assert!(project.file_exists("app.py"));
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: Vec<PathBuf>,
}

impl TestProject {
    /// Create a new, empty project builder.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: BTreeMap::new(),
            dirs: Vec::new(),
        }
    }

    /// Add a text file. Parent directories are created automatically.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.with_bytes(path, contents.into().into_bytes())
    }

    /// Add a file with raw (possibly non-UTF-8) contents.
    pub fn with_bytes(mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a small generated Python app.
    pub fn with_python_app(self) -> Self {
        self.with_file("main.py", content::PYTHON_MAIN)
            .with_file("requirements.txt", content::REQUIREMENTS)
            .with_file("README.md", "# Demo app\n")
    }

    /// Add a project configuration file (`pilot.json`).
    pub fn with_config(self, config: &str) -> Self {
        self.with_file("pilot.json", config)
    }

    /// Write everything to disk.
    pub fn build(self) -> BuiltTestProject {
        let root = self.temp_dir.path();

        for dir in &self.dirs {
            let full_path = root.join(dir);
            fs::create_dir_all(&full_path).unwrap_or_else(|e| {
                panic!("Failed to create directory {}: {}", full_path.display(), e)
            });
        }

        for (path, contents) in &self.files {
            let full_path = root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!("Failed to create directory {}: {}", parent.display(), e)
                });
            }
            fs::write(&full_path, contents)
                .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
        }

        BuiltTestProject {
            temp_dir: self.temp_dir,
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A project written to a temporary directory.
pub struct BuiltTestProject {
    temp_dir: TempDir,
}

impl BuiltTestProject {
    /// The project root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Read a file, panicking if it is missing.
    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    /// Check if a file or directory exists.
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path.as_ref()).exists()
    }

    /// Write a file, simulating an edit made outside pilot.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) {
        let full_path = self.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(&full_path, contents.as_ref())
            .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
    }

    /// Delete a file.
    pub fn delete_file(&self, path: impl AsRef<Path>) {
        let full_path = self.path().join(path.as_ref());
        fs::remove_file(&full_path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", full_path.display(), e));
    }

    /// Relative paths of all files below the root, sorted, with `/` separators.
    pub fn all_files(&self) -> Vec<String> {
        fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
            let Ok(entries) = fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, root, out);
                } else if let Ok(relative) = path.strip_prefix(root) {
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    out.push(parts.join("/"));
                }
            }
        }

        let mut files = Vec::new();
        walk(self.path(), self.path(), &mut files);
        files.sort();
        files
    }
}

/// Common test file contents.
pub mod content {
    /// Entry point of a generated Python app.
    pub const PYTHON_MAIN: &str = r#"from app import create_app

app = create_app()

if __name__ == "__main__":
    app.run()
"#;

    /// Python requirements.
    pub const REQUIREMENTS: &str = "flask==3.0.0\n";

    /// A project configuration selecting one LLM provider.
    pub fn pilot_config(project: &str, provider: &str, model: &str) -> String {
        format!(
            r#"{{
    "project": "{project}",
    "llm": {{
        "{provider}": {{ "model": "{model}" }}
    }}
}}"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_project() {
        let project = TestProject::new().build();
        assert!(project.path().exists());
        assert!(project.all_files().is_empty());
    }

    #[test]
    fn test_project_with_files() {
        let project = TestProject::new()
            .with_file("test.txt", "Hello")
            .with_file("src/app/views.py", "pass\n")
            .with_bytes("logo.png", vec![0x89, 0x50])
            .build();

        assert_eq!(project.read_file("test.txt"), "Hello");
        assert_eq!(
            project.all_files(),
            vec!["logo.png", "src/app/views.py", "test.txt"]
        );
    }

    #[test]
    fn test_project_with_dir() {
        let project = TestProject::new().with_dir("static/css").build();
        assert!(project.file_exists("static/css"));
        assert!(project.all_files().is_empty());
    }

    #[test]
    fn test_python_app() {
        let project = TestProject::new().with_python_app().build();
        assert!(project.read_file("main.py").contains("create_app"));
        assert_eq!(project.all_files().len(), 3);
    }

    #[test]
    fn test_write_and_delete() {
        let project = TestProject::new().build();

        project.write_file("deep/nested/file.txt", "content");
        assert!(project.file_exists("deep/nested/file.txt"));

        project.delete_file("deep/nested/file.txt");
        assert!(!project.file_exists("deep/nested/file.txt"));
    }

    #[test]
    fn test_pilot_config() {
        let config = content::pilot_config("demo", "openai", "gpt-4o");
        let project = TestProject::new().with_config(&config).build();
        let written = project.read_file("pilot.json");
        assert!(written.contains("\"project\": \"demo\""));
        assert!(written.contains("gpt-4o"));
    }
}
