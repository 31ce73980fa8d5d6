//! Runs `golangci-lint` over a Go source tree inside a container.
//!
//! Without a caller-supplied configuration the linter gets an opinionated
//! default that ships with this crate. Module, build and lint caches live in
//! named volumes so repeated runs stay fast.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::contract::{resolve_mount_source, ContainerRunner, ContainerSpec};
use crate::error::{RelayError, Result};

pub const GOLANGCI_LINT_IMAGE: &str = "golangci/golangci-lint:v2.8.0";

const DEFAULT_CONFIG: &str = include_str!("../assets/golangci.yml");
const SOURCE_MOUNT: &str = "/src";
// Outside SOURCE_MOUNT, so the runtime never creates a mountpoint file in the
// caller's tree.
const CONFIG_PATH: &str = "/etc/golangci/.golangci.yml";

#[derive(Debug, Clone, Default)]
pub struct LintConfig {
    /// Go source directory to lint.
    pub source: PathBuf,
    /// Replaces the built-in configuration when set.
    pub config_file: Option<PathBuf>,
    /// Extra environment in `KEY=VALUE` form, e.g. `GOEXPERIMENT=rangefunc`.
    pub env_vars: Vec<String>,
    /// Image with `golangci-lint` on `PATH`, for callers that need extra
    /// system libraries.
    pub base_image: Option<String>,
}

/// Splits a `KEY=VALUE` entry. The key must be non-empty; the value may be.
pub fn parse_env_var(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(RelayError::configuration(format!(
            "invalid env var {entry:?}: must be in KEY=VALUE format"
        ))),
    }
}

pub struct GoLinter<R> {
    runner: R,
    config: LintConfig,
    env: Vec<(String, String)>,
}

impl<R: ContainerRunner> GoLinter<R> {
    /// Validates `config` up front so a malformed env var fails before any
    /// container starts.
    pub fn new(runner: R, config: LintConfig) -> Result<Self> {
        let env = config
            .env_vars
            .iter()
            .map(|e| parse_env_var(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            runner,
            config,
            env,
        })
    }

    /// `golangci-lint run` arguments with `extra` flags before the package
    /// pattern.
    pub fn build_args(extra: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = ["golangci-lint", "run", "--config", CONFIG_PATH]
            .map(str::to_string)
            .to_vec();
        args.extend(extra.iter().map(|s| s.to_string()));
        args.push("./...".to_string());
        args
    }

    /// Lints without fixing and returns the linter output. Violations make
    /// the run fail.
    pub async fn check(&self) -> Result<String> {
        info!(source = %self.config.source.display(), "Running golangci-lint check");
        let (spec, _config_dir) = self.container(Self::build_args(&[]))?;
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| e.within("golangci-lint check"))?;
        Ok(output.stdout)
    }

    /// Lints with `--fix`; fixes are written back into the source directory.
    pub async fn fix(&self) -> Result<String> {
        info!(source = %self.config.source.display(), "Running golangci-lint with --fix");
        let (spec, _config_dir) = self.container(Self::build_args(&["--fix"]))?;
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| e.within("golangci-lint fix"))?;
        Ok(output.stdout)
    }

    /// Builds the container; the returned directory holds the default
    /// config and must outlive the run.
    fn container(&self, args: Vec<String>) -> Result<(ContainerSpec, Option<TempDir>)> {
        let image = self
            .config
            .base_image
            .clone()
            .unwrap_or_else(|| GOLANGCI_LINT_IMAGE.to_string());

        let mut spec = ContainerSpec::new(image)
            .with_cache("go-mod", "/go/pkg/mod")
            .with_cache("go-build", "/root/.cache/go-build")
            .with_cache("golangci-lint", "/root/.cache/golangci-lint")
            .with_mount(host_path(&self.config.source)?, SOURCE_MOUNT)
            .with_workdir(SOURCE_MOUNT);

        let config_dir = match &self.config.config_file {
            Some(path) => {
                spec = spec.with_mount(host_path(path)?, CONFIG_PATH);
                None
            }
            None => {
                let dir = write_default_config()?;
                spec = spec.with_mount(host_path(&dir.path().join(".golangci.yml"))?, CONFIG_PATH);
                Some(dir)
            }
        };

        for (key, value) in &self.env {
            spec = spec.with_env(key, value);
        }
        Ok((spec.with_args(args), config_dir))
    }
}

fn host_path(path: &Path) -> Result<PathBuf> {
    resolve_mount_source(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "Cannot resolve lint mount source");
        RelayError::io(path, e)
    })
}

fn write_default_config() -> Result<TempDir> {
    let dir = tempfile::tempdir().map_err(|e| RelayError::io(std::env::temp_dir(), e))?;
    let path: &Path = &dir.path().join(".golangci.yml");
    fs::write(path, DEFAULT_CONFIG).map_err(|e| RelayError::io(path, e))?;
    debug!(path = %path.display(), "Wrote built-in golangci-lint configuration");
    Ok(dir)
}
