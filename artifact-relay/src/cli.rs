/// # artifact-relay CLI Interface (Module)
///
/// Command parsing and orchestration for the `artifact-relay` binary.
///
/// All pipeline logic (flattening, upload decisions, transports, linting)
/// lives in [`artifact-relay-core`]. This module resolves configuration and
/// credentials, wires the container-backed implementations together, and
/// reports the outcome.
///
/// ## How To Use
/// - From a shell: `artifact-relay --help`.
/// - Programmatically or in tests: build a [`Cli`] and call [`run`].
///
/// [`artifact-relay-core`]: ../../artifact-relay-core/
use crate::credentials::{github_token_from_env, BucketTarget};
use crate::load_config::{load_config, RelayConfig};
use anyhow::{Context, Result};
use artifact_relay_core::checksum::{checksum_dir, file_sha256_base64};
use artifact_relay_core::flatten::{flatten_dir, FlattenMode};
use artifact_relay_core::lint::{GoLinter, LintConfig};
use artifact_relay_core::metadata::FileMetadata;
use artifact_relay_core::release::{publish_release, ReleaseConfig};
use artifact_relay_core::runner::DockerRunner;
use artifact_relay_core::transport::{GhReleaseTransport, S3CliTransport};
use artifact_relay_core::upload::{BucketUploader, UploadReport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for artifact-relay: prepare build outputs and publish them.
#[derive(Parser)]
#[clap(
    name = "artifact-relay",
    version,
    about = "Flatten, checksum, lint and publish build artifacts to buckets and GitHub releases"
)]
pub struct Cli {
    /// Optional YAML config (images, per-file metadata, flatten mode)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename `<os>/<arch>/<file>` build outputs into a flat directory
    Flatten {
        /// Build directory laid out as `<os>/<arch>/<file>`
        #[clap(long)]
        build: PathBuf,
        /// Directory to write flattened files into
        #[clap(long)]
        out: PathBuf,
        /// Fail on entries that do not match the layout instead of skipping them
        #[clap(long)]
        strict: bool,
    },
    /// Write a `sha256sum` sidecar next to every file in a directory
    Checksum {
        #[clap(long)]
        dir: PathBuf,
    },
    /// Upload a directory to the bucket under an explicit prefix
    UploadTree {
        #[clap(long)]
        artifacts: PathBuf,
        /// Key prefix inside the bucket; empty means the bucket root
        #[clap(long, default_value = "")]
        prefix: String,
    },
    /// Upload a directory under `<version>/` and then `latest/`
    UploadLatest {
        #[clap(long)]
        artifacts: PathBuf,
        #[clap(long)]
        version: String,
    },
    /// Upload a directory under `nightly/`
    UploadNightly {
        #[clap(long)]
        artifacts: PathBuf,
    },
    /// Upload a single file under a prefix
    UploadFile {
        #[clap(long)]
        file: PathBuf,
        #[clap(long, default_value = "")]
        prefix: String,
        #[clap(long)]
        content_type: Option<String>,
        /// Base64 SHA-256 to send as the object checksum
        #[clap(long, conflicts_with = "compute_checksum")]
        checksum_sha256: Option<String>,
        /// Compute the object checksum from the file contents
        #[clap(long)]
        compute_checksum: bool,
    },
    /// Attach a directory of assets to a GitHub release
    Release {
        #[clap(long)]
        assets: PathBuf,
        /// Repository in `owner/name` form
        #[clap(long)]
        repo: String,
        #[clap(long)]
        tag: String,
        /// Flatten `<os>/<arch>/<file>` assets before uploading
        #[clap(long)]
        flatten: bool,
    },
    /// Run golangci-lint over a Go source directory in a container
    Lint {
        #[clap(long)]
        source: PathBuf,
        /// golangci-lint config replacing the built-in one
        #[clap(long)]
        lint_config: Option<PathBuf>,
        /// Extra container environment, repeatable, in KEY=VALUE form
        #[clap(long = "env")]
        env_vars: Vec<String>,
        /// Image providing golangci-lint; overrides the config file
        #[clap(long)]
        image: Option<String>,
        /// Apply automatic fixes to the mounted source
        #[clap(long)]
        fix: bool,
    },
}

fn bucket_uploader(config: &RelayConfig) -> Result<BucketUploader<S3CliTransport<DockerRunner>>> {
    let target = BucketTarget::new_from_env().context("Failed to resolve bucket credentials")?;
    let runner = DockerRunner::with_binary(&config.runtime);
    let transport =
        S3CliTransport::new(runner, target.credentials).with_image(&config.images.aws_cli);
    Ok(BucketUploader::new(transport, target.bucket))
}

fn report_upload(command: &str, report: &UploadReport) {
    tracing::info!(
        command,
        destination = %report.destination,
        copies = report.copies.len(),
        "Upload complete"
    );
    println!("Uploaded to {}", report.destination);
}

/// Async CLI entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Flatten { build, out, strict } => {
            let mode = if strict {
                FlattenMode::Strict
            } else {
                config.flatten_mode
            };
            tracing::info!(command = "flatten", ?build, ?out, ?mode, "Flattening build tree");
            let written = flatten_dir(&build, &out, mode)
                .with_context(|| format!("Failed to flatten {}", build.display()))?;
            for name in &written {
                println!("{name}");
            }
            tracing::info!(command = "flatten", files = written.len(), "Flatten complete");
        }
        Commands::Checksum { dir } => {
            tracing::info!(command = "checksum", ?dir, "Writing checksum sidecars");
            let sidecars = checksum_dir(&dir)
                .with_context(|| format!("Failed to checksum {}", dir.display()))?;
            for sidecar in &sidecars {
                println!("{}", sidecar.display());
            }
        }
        Commands::UploadTree { artifacts, prefix } => {
            let uploader = bucket_uploader(&config)?;
            let report = uploader
                .upload_tree(&artifacts, &prefix, &config.metadata)
                .await?;
            report_upload("upload-tree", &report);
        }
        Commands::UploadLatest { artifacts, version } => {
            let uploader = bucket_uploader(&config)?;
            let reports = uploader
                .upload_latest(&artifacts, &version, &config.metadata)
                .await?;
            for report in &reports {
                report_upload("upload-latest", report);
            }
        }
        Commands::UploadNightly { artifacts } => {
            let uploader = bucket_uploader(&config)?;
            let report = uploader
                .upload_nightly(&artifacts, &config.metadata)
                .await?;
            report_upload("upload-nightly", &report);
        }
        Commands::UploadFile {
            file,
            prefix,
            content_type,
            checksum_sha256,
            compute_checksum,
        } => {
            let checksum = if compute_checksum {
                Some(file_sha256_base64(&file)?)
            } else {
                checksum_sha256
            };
            let mut meta = FileMetadata::new();
            if let Some(content_type) = content_type {
                meta = meta.with_content_type(content_type);
            }
            if let Some(checksum) = checksum {
                meta = meta.with_checksum_sha256(checksum);
            }
            let meta = (!meta.is_empty()).then_some(meta);

            let uploader = bucket_uploader(&config)?;
            let report = uploader.upload_file(&file, &prefix, meta).await?;
            report_upload("upload-file", &report);
        }
        Commands::Release {
            assets,
            repo,
            tag,
            flatten,
        } => {
            let mut release = ReleaseConfig::new(repo, tag)?;
            if flatten {
                release = release.with_flatten(config.flatten_mode);
            }
            let token = github_token_from_env().context("Failed to resolve GitHub token")?;
            let transport = GhReleaseTransport::new(
                DockerRunner::with_binary(&config.runtime),
                release.repo(),
                token,
            )
            .with_image(&config.images.alpine);

            match publish_release(&release, &assets, &transport).await {
                Ok(report) => {
                    tracing::info!(command = "release", ?report, "Release upload complete");
                    println!("Uploaded assets to release {}", report.tag);
                }
                Err(e) => {
                    tracing::error!(command = "release", error = %e, "Release upload failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Lint {
            source,
            lint_config,
            env_vars,
            image,
            fix,
        } => {
            let lint = LintConfig {
                source,
                config_file: lint_config,
                env_vars,
                base_image: Some(image.unwrap_or_else(|| config.images.golangci_lint.clone())),
            };
            let linter = GoLinter::new(DockerRunner::with_binary(&config.runtime), lint)?;
            let output = if fix {
                linter.fix().await?
            } else {
                linter.check().await?
            };
            print!("{output}");
        }
    }

    Ok(())
}
