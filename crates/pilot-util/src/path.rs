//! Path utilities.
//!
//! Platform directories for pilot plus helpers for the relative, POSIX-style
//! paths used to key files inside a workspace.

use std::path::{Component, Path, PathBuf};

/// Name of the project-local pilot directory.
pub const PROJECT_DIR_NAME: &str = ".pilot";

/// Get the pilot configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/pilot` if set
/// - `~/.config/pilot` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pilot"))
}

/// Get the pilot data directory.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("pilot"))
}

/// Get the pilot logs directory.
///
/// Linux: `~/.local/state/pilot/logs`, elsewhere under the local data dir.
pub fn logs_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join("pilot").join("logs"))
}

/// Get the project-local pilot directory.
pub fn project_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR_NAME)
}

/// Normalize a workspace-relative path into its canonical POSIX form.
///
/// Backslashes are treated as separators, `.` components and duplicate
/// separators are dropped. Returns `None` for empty paths, absolute paths and
/// paths containing `..`.
pub fn normalize_relative(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') || has_drive_prefix(path) {
        return None;
    }

    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return None,
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Convert a path below `base` into a workspace-relative POSIX string.
///
/// Returns `None` if the path is not within `base` or is not valid UTF-8.
pub fn relative_posix(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => continue,
            _ => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        if let Some(dir) = config_dir() {
            assert!(dir.ends_with("pilot"));
        }
    }

    #[test]
    fn test_project_dir() {
        let dir = project_dir(Path::new("/home/user/app"));
        assert_eq!(dir, PathBuf::from("/home/user/app/.pilot"));
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("src/main.rs"), Some("src/main.rs".into()));
        assert_eq!(normalize_relative("./src//main.rs"), Some("src/main.rs".into()));
        assert_eq!(normalize_relative("src\\lib.rs"), Some("src/lib.rs".into()));
        assert_eq!(normalize_relative("foo.txt"), Some("foo.txt".into()));
    }

    #[test]
    fn test_normalize_relative_rejects_escapes() {
        assert_eq!(normalize_relative(""), None);
        assert_eq!(normalize_relative("."), None);
        assert_eq!(normalize_relative("/etc/passwd"), None);
        assert_eq!(normalize_relative("../secret"), None);
        assert_eq!(normalize_relative("src/../../x"), None);
        assert_eq!(normalize_relative("C:\\windows"), None);
    }

    #[test]
    fn test_relative_posix() {
        let base = Path::new("/home/user/project");
        let path = Path::new("/home/user/project/src/main.rs");
        assert_eq!(relative_posix(path, base), Some("src/main.rs".into()));
        assert_eq!(relative_posix(Path::new("/tmp/x"), base), None);
        assert_eq!(relative_posix(base, base), None);
    }
}
