//! Per-file upload metadata and the path-keyed index used to look it up.
//!
//! Callers describe files by the path they expect inside an artifacts
//! directory. Those paths arrive in whatever shape the pipeline produced
//! (`./bin/app`, `/bin/app`, `bin/app`), so every path is normalized to a
//! [`PathKey`] before it is stored or looked up.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canonical form of a relative artifact path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// Strips one leading `./`, then one leading `/`.
    pub fn normalize(path: &str) -> Self {
        let path = path.strip_prefix("./").unwrap_or(path);
        let path = path.strip_prefix('/').unwrap_or(path);
        PathKey(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathKey {
    fn from(path: &str) -> Self {
        PathKey::normalize(path)
    }
}

/// Optional upload headers for one file. An absent field means the header is
/// not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// MIME type sent as `Content-Type` (e.g. `application/octet-stream`).
    #[serde(default)]
    pub content_type: Option<String>,
    /// Base64 SHA-256 digest sent as `x-amz-checksum-sha256`.
    #[serde(default)]
    pub checksum_sha256: Option<String>,
}

impl FileMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_checksum_sha256(mut self, checksum: impl Into<String>) -> Self {
        self.checksum_sha256 = Some(checksum.into());
        self
    }

    /// Content type, if set to a non-empty value.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref().filter(|s| !s.is_empty())
    }

    /// Checksum, if set to a non-empty value.
    pub fn checksum_sha256(&self) -> Option<&str> {
        self.checksum_sha256.as_deref().filter(|s| !s.is_empty())
    }

    /// True when neither header would be sent.
    pub fn is_empty(&self) -> bool {
        self.content_type().is_none() && self.checksum_sha256().is_none()
    }
}

/// A relative file path paired with its upload metadata, as supplied by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePathMetadata {
    /// Relative path inside the artifacts directory (e.g. `bin/my-binary`).
    pub path: String,
    #[serde(flatten)]
    pub meta: FileMetadata,
}

impl FilePathMetadata {
    pub fn new(path: impl Into<String>, meta: FileMetadata) -> Self {
        Self {
            path: path.into(),
            meta,
        }
    }
}

/// Lookup table from [`PathKey`] to [`FileMetadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataIndex {
    entries: HashMap<PathKey, FileMetadata>,
}

impl MetadataIndex {
    /// Builds the index in input order. A later entry for the same key
    /// replaces an earlier one. Paths are not checked against any tree.
    pub fn build<'a, I>(metadata: I) -> Self
    where
        I: IntoIterator<Item = &'a FilePathMetadata>,
    {
        let mut entries = HashMap::new();
        for item in metadata {
            let key = PathKey::normalize(&item.path);
            if entries.insert(key.clone(), item.meta.clone()).is_some() {
                debug!(key = %key, "Replacing earlier metadata entry for path");
            }
        }
        MetadataIndex { entries }
    }

    pub fn get(&self, key: &PathKey) -> Option<&FileMetadata> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
