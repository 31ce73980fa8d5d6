//! Collapses an `<os>/<arch>/<filename>` build tree into a flat directory.
//!
//! `darwin/arm64/tapes` becomes `tapes-darwin-arm64` and
//! `darwin/arm64/tapes.sha256` becomes `tapes-darwin-arm64.sha256`, so that
//! checksum files keep their extension next to the binary they describe.
//!
//! Only entries exactly three segments deep take part. What happens to
//! everything else, and to two entries that land on the same name, is chosen
//! by [`FlattenMode`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::listing::list_regular_files;

const CHECKSUM_SUFFIX: &str = ".sha256";

/// Depth of `<os>/<arch>/<filename>`; the deepest level [`flatten_dir`] reads.
pub const LAYOUT_DEPTH: usize = 3;

/// A file read from a source tree: its relative path segments and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    segments: Vec<String>,
    content: Vec<u8>,
}

impl ArtifactEntry {
    /// Splits `path` on `/`, dropping empty segments.
    pub fn new(path: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            content: content.into(),
        }
    }

    pub fn from_segments(segments: Vec<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            segments,
            content: content.into(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Flattened output, keyed by the new file name.
pub type FlattenedTree = BTreeMap<String, Vec<u8>>;

/// How to treat entries that do not fit the `<os>/<arch>/<filename>` layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenMode {
    /// Skip entries at any other depth; a later entry overwrites an earlier
    /// one with the same flattened name.
    #[default]
    Lenient,
    /// Reject both cases with [`RelayError::InvalidLayout`].
    Strict,
}

impl std::str::FromStr for FlattenMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lenient" => Ok(FlattenMode::Lenient),
            "strict" => Ok(FlattenMode::Strict),
            other => Err(RelayError::configuration(format!(
                "unknown flatten mode {other:?}, expected \"lenient\" or \"strict\""
            ))),
        }
    }
}

/// The composite name for `filename` built for `os`/`arch`.
pub fn flattened_name(os: &str, arch: &str, filename: &str) -> String {
    match filename.strip_suffix(CHECKSUM_SUFFIX) {
        Some(base) => format!("{base}-{os}-{arch}{CHECKSUM_SUFFIX}"),
        None => format!("{filename}-{os}-{arch}"),
    }
}

/// Re-keys every three-segment entry under its flattened name.
pub fn flatten(entries: &[ArtifactEntry], mode: FlattenMode) -> Result<FlattenedTree> {
    let mut tree = FlattenedTree::new();

    for entry in entries {
        let [os, arch, filename] = entry.segments() else {
            if mode == FlattenMode::Strict {
                return Err(RelayError::InvalidLayout {
                    path: entry.path(),
                    details: format!(
                        "expected <os>/<arch>/<filename>, found {} segment(s)",
                        entry.segments().len()
                    ),
                });
            }
            debug!(path = %entry.path(), "Skipping entry outside <os>/<arch>/<filename> layout");
            continue;
        };

        let name = flattened_name(os, arch, filename);
        if tree.contains_key(&name) {
            if mode == FlattenMode::Strict {
                return Err(RelayError::InvalidLayout {
                    path: entry.path(),
                    details: format!("flattened name {name} is already taken"),
                });
            }
            warn!(path = %entry.path(), name = %name, "Flattened name collision, later entry wins");
        }
        debug!(path = %entry.path(), name = %name, "Flattened artifact");
        tree.insert(name, entry.content().to_vec());
    }

    Ok(tree)
}

/// Reads every regular file at depth `1..=max_depth` below `root`, in sorted
/// path order. Deeper files are neither listed nor read.
pub fn read_tree(root: &Path, max_depth: usize) -> Result<Vec<ArtifactEntry>> {
    list_regular_files(root, max_depth)?
        .into_iter()
        .map(|file| {
            let content = fs::read(&file.path).map_err(|e| RelayError::io(&file.path, e))?;
            Ok(ArtifactEntry::from_segments(file.segments, content))
        })
        .collect()
}

/// Writes `tree` into `dest` as flat files, creating `dest` if needed.
pub fn write_tree(dest: &Path, tree: &FlattenedTree) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| RelayError::io(dest, e))?;
    for (name, content) in tree {
        let path = dest.join(name);
        fs::write(&path, content).map_err(|e| RelayError::io(&path, e))?;
    }
    Ok(())
}

/// Reads `build` down to [`LAYOUT_DEPTH`], flattens it and writes the result
/// into `dest`. Returns the names written.
pub fn flatten_dir(build: &Path, dest: &Path, mode: FlattenMode) -> Result<Vec<String>> {
    info!(build = %build.display(), dest = %dest.display(), ?mode, "Flattening build artifacts");
    let entries = read_tree(build, LAYOUT_DEPTH)?;
    let tree = flatten(&entries, mode)?;
    write_tree(dest, &tree)?;
    info!(read = entries.len(), written = tree.len(), "Completed flattening");
    Ok(tree.into_keys().collect())
}
