//! Chooses between one bulk sync and per-file copies.
//!
//! Bulk sync is the fast path. As soon as any metadata is supplied the whole
//! batch switches to per-file copies, because a sync invocation cannot carry
//! per-file headers. Files without an index entry are still copied, just
//! without headers.

use crate::metadata::{FileMetadata, MetadataIndex, PathKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyDecision {
    /// Synchronise the entire tree in one invocation.
    Bulk,
    /// Copy one file, with headers when `metadata` is present.
    Targeted {
        key: PathKey,
        metadata: Option<FileMetadata>,
    },
}

/// One decision per file, or a single [`CopyDecision::Bulk`] when `index` is
/// empty. Files are visited in the order given.
pub fn decide<'a, I>(all_files: I, index: &MetadataIndex) -> Vec<CopyDecision>
where
    I: IntoIterator<Item = &'a PathKey>,
{
    if index.is_empty() {
        return vec![CopyDecision::Bulk];
    }

    all_files
        .into_iter()
        .map(|key| CopyDecision::Targeted {
            key: key.clone(),
            metadata: index.get(key).filter(|m| !m.is_empty()).cloned(),
        })
        .collect()
}
