//! Concrete [`CopyTransport`]s that drive a CLI inside a container.
//!
//! - [`S3CliTransport`]: the AWS CLI against any S3-compatible endpoint.
//! - [`GhReleaseTransport`]: the GitHub CLI uploading release assets.
//!
//! Both only build a [`ContainerSpec`]; execution, exit-status checking and
//! cancellation belong to the [`ContainerRunner`].

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::contract::{
    resolve_mount_source, ContainerRunner, ContainerSpec, CopyRequest, CopySource, CopyTransport,
};
use crate::error::{RelayError, Result};
use crate::metadata::FileMetadata;

pub const AWS_CLI_IMAGE: &str = "amazon/aws-cli:latest";
pub const ALPINE_IMAGE: &str = "alpine:latest";

const ARTIFACTS_MOUNT: &str = "/artifacts";
const DIST_MOUNT: &str = "/dist";

/// Credentials and endpoint for an S3-compatible bucket.
#[derive(Clone)]
pub struct BucketCredentials {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for BucketCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketCredentials")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

pub struct S3CliTransport<R> {
    runner: R,
    image: String,
    credentials: BucketCredentials,
}

impl<R: ContainerRunner> S3CliTransport<R> {
    pub fn new(runner: R, credentials: BucketCredentials) -> Self {
        Self {
            runner,
            image: AWS_CLI_IMAGE.to_string(),
            credentials,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    fn base_spec(&self, root: &Path) -> ContainerSpec {
        ContainerSpec::new(&self.image)
            .with_secret_env("AWS_ACCESS_KEY_ID", &self.credentials.access_key_id)
            .with_secret_env("AWS_SECRET_ACCESS_KEY", &self.credentials.secret_access_key)
            .with_env("AWS_DEFAULT_REGION", "auto")
            .with_mount(root, ARTIFACTS_MOUNT)
            .with_workdir(ARTIFACTS_MOUNT)
    }
}

/// `aws s3 cp` flags for whichever headers are present.
pub fn s3_header_args(meta: &FileMetadata) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(content_type) = meta.content_type() {
        args.extend(["--content-type".to_string(), content_type.to_string()]);
    }
    if let Some(checksum) = meta.checksum_sha256() {
        args.extend([
            "--checksum-algorithm".to_string(),
            "SHA256".to_string(),
            "--checksum-sha256".to_string(),
            checksum.to_string(),
        ]);
    }
    args
}

/// Absolute form of a copy root, so the runtime bind-mounts the directory.
fn mount_root(root: &Path) -> Result<PathBuf> {
    resolve_mount_source(root).map_err(|e| {
        error!(path = %root.display(), error = %e, "Cannot resolve artifacts directory");
        RelayError::Listing {
            path: root.to_path_buf(),
            source: e,
        }
    })
}

#[async_trait]
impl<R: ContainerRunner> CopyTransport for S3CliTransport<R> {
    async fn run_copy(&self, request: CopyRequest) -> Result<()> {
        let endpoint = self.credentials.endpoint_url.as_str();
        let destination = request.destination.as_str();
        let (step, spec) = match &request.source {
            CopySource::Tree(root) => {
                info!(source = %root.display(), destination, "Syncing tree to bucket");
                let args = [
                    "aws",
                    "s3",
                    "sync",
                    ".",
                    destination,
                    "--endpoint-url",
                    endpoint,
                ];
                let spec = self.base_spec(&mount_root(root)?).with_args(args);
                ("aws s3 sync".to_string(), spec)
            }
            CopySource::File { root, key } => {
                debug!(
                    key = %key,
                    destination,
                    headers = ?request.headers,
                    "Copying file to bucket"
                );
                let mut args: Vec<String> = [
                    "aws",
                    "s3",
                    "cp",
                    key.as_str(),
                    destination,
                    "--endpoint-url",
                    endpoint,
                ]
                .map(str::to_string)
                .to_vec();
                if let Some(meta) = &request.headers {
                    args.extend(s3_header_args(meta));
                }
                let spec = self.base_spec(&mount_root(root)?).with_args(args);
                (format!("aws s3 cp {key}"), spec)
            }
        };

        self.runner.run(&spec).await.map_err(|e| e.within(&step))?;
        Ok(())
    }
}

pub struct GhReleaseTransport<R> {
    runner: R,
    image: String,
    repo: String,
    token: String,
}

impl<R: ContainerRunner> GhReleaseTransport<R> {
    /// `repo` is `owner/name`. The copy destination is the release tag.
    pub fn new(runner: R, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            runner,
            image: ALPINE_IMAGE.to_string(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn top_level_files(dir: &Path) -> Result<Vec<String>> {
    let listing = |e| RelayError::Listing {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing)? {
        let entry = entry.map_err(listing)?;
        if entry.file_type().map_err(listing)?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl<R: ContainerRunner> CopyTransport for GhReleaseTransport<R> {
    async fn run_copy(&self, request: CopyRequest) -> Result<()> {
        let tag = request.destination.as_str();
        if request.headers.is_some() {
            debug!(tag, "Release assets do not take upload headers, ignoring");
        }

        let (root, files) = match &request.source {
            CopySource::Tree(root) => (root, top_level_files(root)?),
            CopySource::File { root, key } => (root, vec![key.to_string()]),
        };
        if files.is_empty() {
            warn!(tag, source = %root.display(), "No release assets to upload");
            return Ok(());
        }

        info!(tag, repo = %self.repo, count = files.len(), "Uploading release assets");
        let mut args: Vec<String> = [
            "gh",
            "release",
            "upload",
            tag,
            "--repo",
            self.repo.as_str(),
            "--clobber",
        ]
        .map(str::to_string)
        .to_vec();
        args.extend(files.iter().map(|f| format!("{DIST_MOUNT}/{f}")));

        let spec = ContainerSpec::new(&self.image)
            .with_setup("apk add --no-cache github-cli")
            .with_secret_env("GH_TOKEN", &self.token)
            .with_mount(mount_root(root)?, DIST_MOUNT)
            .with_args(args);

        self.runner
            .run(&spec)
            .await
            .map_err(|e| e.within("gh release upload"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContainerOutput, MockContainerRunner};
    use crate::metadata::PathKey;
    use crate::runner::docker_args;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn credentials() -> BucketCredentials {
        BucketCredentials {
            endpoint_url: "https://r2.example.com".into(),
            access_key_id: "AKIA".into(),
            secret_access_key: "s3cr3t".into(),
        }
    }

    fn capturing_runner() -> (MockContainerRunner, Arc<Mutex<Vec<ContainerSpec>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut runner = MockContainerRunner::new();
        runner.expect_run().returning(move |spec| {
            sink.lock().unwrap().push(spec.clone());
            Ok(ContainerOutput::default())
        });
        (runner, seen)
    }

    fn tree_request(root: &Path, destination: &str) -> CopyRequest {
        CopyRequest {
            source: CopySource::Tree(root.to_path_buf()),
            destination: destination.into(),
            headers: None,
        }
    }

    fn dist_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/app"), b"bin").unwrap();
        dir
    }

    #[tokio::test]
    async fn bulk_copy_runs_aws_s3_sync() {
        let dist = dist_dir();
        let (runner, seen) = capturing_runner();
        let transport = S3CliTransport::new(runner, credentials());

        transport
            .run_copy(tree_request(dist.path(), "s3://bucket/nightly"))
            .await
            .unwrap();

        let specs = seen.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].image, AWS_CLI_IMAGE);
        assert_eq!(
            specs[0].args,
            [
                "aws",
                "s3",
                "sync",
                ".",
                "s3://bucket/nightly",
                "--endpoint-url",
                "https://r2.example.com",
            ]
        );
        assert_eq!(specs[0].workdir.as_deref(), Some("/artifacts"));
        assert_eq!(specs[0].mounts[0].host, fs::canonicalize(dist.path()).unwrap());
        assert!(specs[0]
            .env
            .contains(&("AWS_DEFAULT_REGION".into(), "auto".into())));
        assert!(specs[0]
            .secret_env
            .iter()
            .any(|(k, v)| k == "AWS_SECRET_ACCESS_KEY" && v == "s3cr3t"));
    }

    #[tokio::test]
    async fn file_copy_appends_present_headers_only() {
        let dist = dist_dir();
        let (runner, seen) = capturing_runner();
        let transport = S3CliTransport::new(runner, credentials());

        transport
            .run_copy(CopyRequest {
                source: CopySource::File {
                    root: dist.path().to_path_buf(),
                    key: PathKey::normalize("bin/app"),
                },
                destination: "s3://bucket/v1/bin/app".into(),
                headers: Some(FileMetadata::new().with_checksum_sha256("q1w2e3==")),
            })
            .await
            .unwrap();

        let specs = seen.lock().unwrap();
        assert_eq!(
            specs[0].args,
            [
                "aws",
                "s3",
                "cp",
                "bin/app",
                "s3://bucket/v1/bin/app",
                "--endpoint-url",
                "https://r2.example.com",
                "--checksum-algorithm",
                "SHA256",
                "--checksum-sha256",
                "q1w2e3==",
            ]
        );
    }

    #[tokio::test]
    async fn relative_root_is_mounted_by_absolute_path() {
        let cwd = std::env::current_dir().unwrap();
        let parent = tempfile::tempdir_in(&cwd).unwrap();
        fs::create_dir(parent.path().join("dist")).unwrap();
        let relative = parent.path().strip_prefix(&cwd).unwrap().join("dist");
        assert!(relative.is_relative());

        let (runner, seen) = capturing_runner();
        let transport = S3CliTransport::new(runner, credentials());
        transport
            .run_copy(tree_request(&relative, "s3://bucket/nightly"))
            .await
            .unwrap();

        let specs = seen.lock().unwrap();
        let args = docker_args(&specs[0]);
        let volume = &args[args.iter().position(|a| a == "-v").unwrap() + 1];
        let (host, container) = volume.rsplit_once(':').unwrap();
        assert!(Path::new(host).is_absolute(), "got: {volume}");
        assert_eq!(Path::new(host), fs::canonicalize(parent.path().join("dist")).unwrap());
        assert_eq!(container, "/artifacts");
    }

    #[tokio::test]
    async fn missing_root_fails_before_the_runner() {
        let mut runner = MockContainerRunner::new();
        runner.expect_run().never();
        let transport = S3CliTransport::new(runner, credentials());

        let err = transport
            .run_copy(tree_request(Path::new("no-such-dist"), "s3://bucket"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Listing { .. }));
    }

    #[test]
    fn header_args_cover_both_fields() {
        let meta = FileMetadata::new()
            .with_content_type("application/gzip")
            .with_checksum_sha256("abc=");
        assert_eq!(
            s3_header_args(&meta),
            [
                "--content-type",
                "application/gzip",
                "--checksum-algorithm",
                "SHA256",
                "--checksum-sha256",
                "abc=",
            ]
        );
        assert!(s3_header_args(&FileMetadata::new()).is_empty());
    }

    #[tokio::test]
    async fn runner_failure_names_the_copy_step() {
        let dist = dist_dir();
        let mut runner = MockContainerRunner::new();
        runner
            .expect_run()
            .returning(|_| Err(RelayError::transfer("docker run", "exit status: 1")));
        let transport = S3CliTransport::new(runner, credentials());

        let err = transport
            .run_copy(tree_request(dist.path(), "s3://bucket"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("aws s3 sync: docker run failed"));
    }

    #[tokio::test]
    async fn release_upload_lists_top_level_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tapes-linux-amd64"), b"bin").unwrap();
        fs::write(dir.path().join("tapes-linux-amd64.sha256"), b"sum").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/skip"), b"x").unwrap();

        let (runner, seen) = capturing_runner();
        let transport = GhReleaseTransport::new(runner, "papercomputeco/tapes", "ghp_token");
        transport
            .run_copy(tree_request(dir.path(), "v1.0.0"))
            .await
            .unwrap();

        let specs = seen.lock().unwrap();
        assert_eq!(specs[0].image, ALPINE_IMAGE);
        assert_eq!(specs[0].setup, ["apk add --no-cache github-cli"]);
        assert_eq!(
            specs[0].args,
            [
                "gh",
                "release",
                "upload",
                "v1.0.0",
                "--repo",
                "papercomputeco/tapes",
                "--clobber",
                "/dist/tapes-linux-amd64",
                "/dist/tapes-linux-amd64.sha256",
            ]
        );
        assert!(specs[0].mounts[0].host.is_absolute());
        assert_eq!(
            specs[0].secret_env,
            [("GH_TOKEN".to_string(), "ghp_token".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_release_dir_skips_the_runner() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockContainerRunner::new();
        runner.expect_run().never();
        let transport = GhReleaseTransport::new(runner, "o/r", "t");
        transport
            .run_copy(tree_request(dir.path(), "nightly"))
            .await
            .unwrap();
    }
}
