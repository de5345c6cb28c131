//! Three-way classification between a stored state and the live workspace.
//!
//! Given the files of the current state (A) and a fresh listing of the
//! workspace (B), every path falls into exactly one class:
//!
//! | class     | condition                    | result                   |
//! |-----------|------------------------------|--------------------------|
//! | added     | in B, not in A               | kept with B's content    |
//! | modified  | in both, content differs     | kept with B's content    |
//! | unchanged | in both, content identical   | kept with A's content    |
//! | deleted   | in A, not in B               | dropped                  |
//!
//! Both inputs are keyed by path, so the outcome does not depend on the order
//! either side was produced in.

use crate::content::FileContent;
use crate::state::File;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::fmt;

/// How a single path differs between the stored state and the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    fn marker(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
        }
    }
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// The classification of every path, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Added, modified and deleted paths.
    pub changes: Vec<FileChange>,
    /// Number of paths identical on both sides.
    pub unchanged: usize,
}

impl ChangeSet {
    /// True when the workspace matches the stored state exactly.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Count of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// Paths of changes of one kind.
    pub fn paths(&self, kind: ChangeKind) -> impl Iterator<Item = &str> {
        self.changes
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.path.as_str())
    }

    /// One-line summary such as `2 added, 1 modified, 0 deleted`.
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} modified, {} deleted",
            self.count(ChangeKind::Added),
            self.count(ChangeKind::Modified),
            self.count(ChangeKind::Deleted)
        )
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(f, "{} {}", change.kind.marker(), change.path)?;
        }
        Ok(())
    }
}

/// Result of reconciling a state against the workspace.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The files the new state should hold, keyed (and thus ordered) by path.
    pub files: BTreeMap<String, FileContent>,
    /// What changed relative to the stored state.
    pub changes: ChangeSet,
}

/// Classify `stored` against the `workspace` listing.
pub fn reconcile(stored: &[File], workspace: &BTreeMap<String, String>) -> Reconciliation {
    let stored: BTreeMap<&str, &FileContent> = stored
        .iter()
        .map(|f| (f.path.as_str(), &f.content))
        .collect();

    let mut files = BTreeMap::new();
    let mut changes = ChangeSet::default();

    for (path, disk) in workspace {
        match stored.get(path.as_str()) {
            Some(existing) if existing.content() == disk.as_str() => {
                files.insert(path.clone(), (*existing).clone());
                changes.unchanged += 1;
            }
            Some(_) => {
                files.insert(path.clone(), FileContent::new(disk.as_str()));
                changes.changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Modified,
                });
            }
            None => {
                files.insert(path.clone(), FileContent::new(disk.as_str()));
                changes.changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Added,
                });
            }
        }
    }

    for path in stored.keys() {
        if !workspace.contains_key(*path) {
            changes.changes.push(FileChange {
                path: path.to_string(),
                kind: ChangeKind::Deleted,
            });
        }
    }

    changes.changes.sort_by(|a, b| a.path.cmp(&b.path));

    Reconciliation { files, changes }
}

/// Generate a unified diff between two versions of one file.
pub fn unified_diff(old: &str, new: &str, path: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- a/{path}\n"));
    output.push_str(&format!("+++ b/{path}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}
