//! Publishes a directory of build artifacts to a release.
//!
//! The assets can be flattened from `<os>/<arch>/<filename>` first, so that
//! `darwin/arm64/tapes` and `darwin/arm64/tapes.sha256` are attached as
//! `tapes-darwin-arm64` and `tapes-darwin-arm64.sha256`.

use std::path::Path;

use tracing::info;

use crate::contract::{CopyRequest, CopySource, CopyTransport};
use crate::error::{RelayError, Result};
use crate::flatten::{flatten_dir, FlattenMode};

/// Where and how to publish. Validated once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
    repo: String,
    tag: String,
    flatten: Option<FlattenMode>,
}

impl ReleaseConfig {
    /// `repo` is `owner/name`; `tag` is the release to attach assets to
    /// (e.g. `nightly`, `v1.0.0`).
    pub fn new(repo: impl Into<String>, tag: impl Into<String>) -> Result<Self> {
        let repo = repo.into();
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(RelayError::configuration("no release tag set"));
        }
        match repo.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => {
                return Err(RelayError::configuration(format!(
                    "repository {repo:?} is not in owner/repo format"
                )))
            }
        }
        Ok(Self {
            repo,
            tag,
            flatten: None,
        })
    }

    /// Flatten the assets before upload.
    pub fn with_flatten(self, mode: FlattenMode) -> Self {
        Self {
            flatten: Some(mode),
            ..self
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn flatten(&self) -> Option<FlattenMode> {
        self.flatten
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub tag: String,
    /// Names produced by flattening; empty when assets were uploaded as-is.
    pub flattened: Vec<String>,
}

/// Uploads the top-level files of `assets` (or of its flattened form) to the
/// release named by `config`, replacing assets with the same name.
pub async fn publish_release<T: CopyTransport>(
    config: &ReleaseConfig,
    assets: &Path,
    transport: &T,
) -> Result<ReleaseReport> {
    info!(
        repo = %config.repo,
        tag = %config.tag,
        flatten = ?config.flatten,
        "Publishing release assets"
    );

    let staging;
    let mut flattened = Vec::new();
    let dist = match config.flatten {
        Some(mode) => {
            staging = tempfile::tempdir().map_err(|e| RelayError::io(std::env::temp_dir(), e))?;
            flattened = flatten_dir(assets, staging.path(), mode)?;
            staging.path()
        }
        None => assets,
    };

    transport
        .run_copy(CopyRequest {
            source: CopySource::Tree(dist.to_path_buf()),
            destination: config.tag.clone(),
            headers: None,
        })
        .await
        .map_err(|e| e.within("failed to upload release assets"))?;

    Ok(ReleaseReport {
        tag: config.tag.clone(),
        flattened,
    })
}
