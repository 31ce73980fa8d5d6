//! Bucket upload: lays artifacts out under a key prefix and executes the
//! [`plan::decide`] result against a [`CopyTransport`].
//!
//! # Prefix conventions
//! - [`BucketUploader::upload_tree`]: any caller-chosen prefix (`""` is the
//!   bucket root), for one-off releases or nested layouts.
//! - [`BucketUploader::upload_latest`]: the version prefix, then `latest`, so
//!   the most recent release always sits at a well-known path.
//! - [`BucketUploader::upload_nightly`]: the `nightly` prefix.
//! - [`BucketUploader::upload_file`]: a single standalone file, e.g. an
//!   install script.
//!
//! # Error Handling
//! Copies run one after another. The first failure stops the batch and is
//! returned; files already copied stay in place. Re-running converges because
//! the transports overwrite existing keys.

use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::contract::{CopyRequest, CopySource, CopyTransport};
use crate::error::{RelayError, Result};
use crate::listing::list_regular_files;
use crate::metadata::{FileMetadata, FilePathMetadata, MetadataIndex, PathKey};
use crate::plan::{decide, CopyDecision};

pub const NIGHTLY: &str = "nightly";
pub const LATEST: &str = "latest";

/// What an upload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub destination: String,
    pub copies: Vec<CopyDecision>,
}

pub struct BucketUploader<T> {
    transport: T,
    bucket: String,
}

/// `s3://` URL for `prefix` inside `bucket`, joined with path semantics.
pub fn bucket_destination(bucket: &str, prefix: &str) -> String {
    let parts: Vec<&str> = [bucket, prefix]
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("s3://{}", parts.join("/"))
}

/// Relative keys of every regular file below `root`, sorted.
pub fn list_files(root: &Path) -> Result<Vec<PathKey>> {
    Ok(list_regular_files(root, usize::MAX)?
        .iter()
        .map(|file| PathKey::normalize(&file.relative()))
        .collect())
}

impl<T: CopyTransport> BucketUploader<T> {
    pub fn new(transport: T, bucket: impl Into<String>) -> Self {
        Self {
            transport,
            bucket: bucket.into(),
        }
    }

    async fn upload(
        &self,
        artifacts: &Path,
        prefix: &str,
        metadata: &[FilePathMetadata],
    ) -> Result<UploadReport> {
        let destination = bucket_destination(&self.bucket, prefix);
        let index = MetadataIndex::build(metadata);

        // Listing is only needed for per-file copies.
        let files = if index.is_empty() {
            Vec::new()
        } else {
            list_files(artifacts)?
        };
        let copies = decide(&files, &index);
        info!(
            source = %artifacts.display(),
            destination = %destination,
            metadata_entries = index.len(),
            copies = copies.len(),
            "Uploading artifacts"
        );

        for copy in &copies {
            let request = match copy {
                CopyDecision::Bulk => CopyRequest {
                    source: CopySource::Tree(artifacts.to_path_buf()),
                    destination: destination.clone(),
                    headers: None,
                },
                CopyDecision::Targeted { key, metadata } => CopyRequest {
                    source: CopySource::File {
                        root: artifacts.to_path_buf(),
                        key: key.clone(),
                    },
                    destination: format!("{destination}/{key}"),
                    headers: metadata.clone(),
                },
            };
            if let Err(e) = self.transport.run_copy(request).await {
                error!(destination = %destination, error = %e, "Upload aborted");
                return Err(e.within(&format!("upload to {destination}")));
            }
        }

        Ok(UploadReport {
            destination,
            copies,
        })
    }

    /// Uploads `artifacts` under an explicit `prefix`, keeping the directory's
    /// internal structure as the key suffix.
    pub async fn upload_tree(
        &self,
        artifacts: &Path,
        prefix: &str,
        metadata: &[FilePathMetadata],
    ) -> Result<UploadReport> {
        self.upload(artifacts, prefix, metadata)
            .await
            .map_err(|e| e.within("could not upload tree"))
    }

    /// Uploads under `version`, then under `latest`.
    pub async fn upload_latest(
        &self,
        artifacts: &Path,
        version: &str,
        metadata: &[FilePathMetadata],
    ) -> Result<Vec<UploadReport>> {
        if version.trim_matches('/').is_empty() {
            return Err(RelayError::configuration("a version prefix is required"));
        }
        let versioned = self
            .upload(artifacts, version, metadata)
            .await
            .map_err(|e| e.within("could not upload versioned release artifacts"))?;
        let latest = self
            .upload(artifacts, LATEST, metadata)
            .await
            .map_err(|e| e.within("could not upload latest release artifacts"))?;
        Ok(vec![versioned, latest])
    }

    pub async fn upload_nightly(
        &self,
        artifacts: &Path,
        metadata: &[FilePathMetadata],
    ) -> Result<UploadReport> {
        self.upload(artifacts, NIGHTLY, metadata)
            .await
            .map_err(|e| e.within("could not upload nightly artifacts"))
    }

    /// Uploads a single file under `prefix`. `metadata` applies to the file
    /// itself, keyed by its name.
    pub async fn upload_file(
        &self,
        file: &Path,
        prefix: &str,
        metadata: Option<FileMetadata>,
    ) -> Result<UploadReport> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RelayError::configuration(format!("{} does not name a file", file.display()))
            })?;

        // Stage the file alone so a bulk sync cannot pick up its siblings.
        let staging = tempfile::tempdir().map_err(|e| RelayError::io(std::env::temp_dir(), e))?;
        let staged = staging.path().join(&name);
        fs::copy(file, &staged).map_err(|e| RelayError::io(file, e))?;

        let metadata: Vec<FilePathMetadata> = metadata
            .into_iter()
            .map(|meta| FilePathMetadata::new(name.clone(), meta))
            .collect();

        self.upload(staging.path(), prefix, &metadata)
            .await
            .map_err(|e| e.within("could not upload file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_joins_like_paths() {
        assert_eq!(bucket_destination("artifacts", ""), "s3://artifacts");
        assert_eq!(bucket_destination("artifacts", "nightly"), "s3://artifacts/nightly");
        assert_eq!(bucket_destination("artifacts", "/v1.2.3/"), "s3://artifacts/v1.2.3");
        assert_eq!(bucket_destination("artifacts", "oci//blobs"), "s3://artifacts/oci/blobs");
    }

    #[test]
    fn list_files_walks_recursively_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/app"), b"a").unwrap();
        fs::write(dir.path().join("install.sh"), b"b").unwrap();

        let keys = list_files(dir.path()).unwrap();
        let keys: Vec<&str> = keys.iter().map(PathKey::as_str).collect();
        assert_eq!(keys, ["bin/app", "install.sh"]);
    }

    #[test]
    fn list_files_reports_missing_root() {
        let err = list_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RelayError::Listing { .. }));
    }
}
