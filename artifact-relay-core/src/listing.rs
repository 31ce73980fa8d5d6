//! Sorted enumeration of the regular files below a directory.
//!
//! Only paths are collected here; callers decide whether and how to read
//! the contents.

use std::path::{Path, PathBuf};

use tracing::error;
use walkdir::WalkDir;

use crate::error::{RelayError, Result};

/// A regular file found below a listing root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    /// Full path on disk.
    pub path: PathBuf,
    /// Path components relative to the root.
    pub segments: Vec<String>,
}

impl ListedFile {
    /// Relative path joined with `/`.
    pub fn relative(&self) -> String {
        self.segments.join("/")
    }
}

/// Lists regular files at depth `1..=max_depth` below `root` in sorted path
/// order. Directories deeper than `max_depth` are not descended into.
pub fn list_regular_files(root: &Path, max_depth: usize) -> Result<Vec<ListedFile>> {
    std::fs::metadata(root).map_err(|e| RelayError::Listing {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for item in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            error!(path = %path.display(), error = %e, "Failed to list artifacts");
            RelayError::Listing {
                path,
                source: e.into(),
            }
        })?;
        if !item.file_type().is_file() {
            continue;
        }

        let rel = item
            .path()
            .strip_prefix(root)
            .map_err(|e| RelayError::Listing {
                path: item.path().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;
        let segments = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(ListedFile {
            path: item.path().to_path_buf(),
            segments,
        });
    }

    Ok(files)
}
