//! Path-independent file content.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Content-derived identifier (lowercase hex SHA-256 of the content bytes).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Hash `content` into its identifier.
    pub fn of(content: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(content.as_bytes())))
    }

    /// Wrap an identifier read back from storage.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A piece of text content with an identity independent of any path.
///
/// The same content stored under several paths or in several states shares one
/// `FileContent` (and one stored copy). Cloning is cheap.
#[derive(Clone)]
pub struct FileContent {
    id: ContentId,
    content: Arc<str>,
}

impl FileContent {
    /// Create content, hashing it to derive its identifier.
    pub fn new(content: impl Into<String>) -> Self {
        let content: String = content.into();
        Self {
            id: ContentId::of(&content),
            content: Arc::from(content),
        }
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    /// The text itself.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Byte-exact comparison; no newline or encoding normalization.
impl PartialEq for FileContent {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for FileContent {}

impl PartialEq<str> for FileContent {
    fn eq(&self, other: &str) -> bool {
        &*self.content == other
    }
}

impl PartialEq<&str> for FileContent {
    fn eq(&self, other: &&str) -> bool {
        &*self.content == *other
    }
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContent")
            .field("id", &self.id)
            .field("len", &self.content.len())
            .finish()
    }
}

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for FileContent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.content)
    }
}

impl<'de> Deserialize<'de> for FileContent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
