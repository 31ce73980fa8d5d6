//! Interfaces to the outside world: the copy transport that moves artifacts
//! to a destination, and the container runner that executes a CLI image.
//!
//! Both traits are annotated for `mockall` so the decision logic can be
//! tested without a container runtime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::Result;
use crate::metadata::{FileMetadata, PathKey};

/// What one copy invocation transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// The whole directory, synchronised in one invocation.
    Tree(PathBuf),
    /// A single file identified by its key below `root`.
    File { root: PathBuf, key: PathKey },
}

/// One external copy: source, destination and optional upload headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source: CopySource,
    /// Destination URL or identifier understood by the transport.
    pub destination: String,
    pub headers: Option<FileMetadata>,
}

/// Performs a single external transfer. Implementations decide which tool
/// does the work; callers only see success or a single error.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CopyTransport: Send + Sync {
    async fn run_copy(&self, request: CopyRequest) -> Result<()>;
}

/// A host path bind-mounted into the container. `host` must be absolute; see
/// [`resolve_mount_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
}

/// Absolute, symlink-free form of a bind-mount source. Runtimes read a
/// relative name such as `dist` as a named volume, not a host directory.
pub fn resolve_mount_source(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::canonicalize(path)
}

/// A named volume for caches that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVolume {
    pub name: String,
    pub container: String,
}

/// Everything needed to run one command inside a container image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub mounts: Vec<Mount>,
    pub caches: Vec<CacheVolume>,
    /// Plain environment, visible in the invocation.
    pub env: Vec<(String, String)>,
    /// Secret environment, passed by name only.
    pub secret_env: Vec<(String, String)>,
    pub workdir: Option<String>,
    /// Shell commands run before `args`, e.g. installing a package.
    pub setup: Vec<String>,
    pub args: Vec<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_mount(mut self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.mounts.push(Mount {
            host: host.into(),
            container: container.into(),
        });
        self
    }

    pub fn with_cache(mut self, name: impl Into<String>, container: impl Into<String>) -> Self {
        self.caches.push(CacheVolume {
            name: name.into(),
            container: container.into(),
        });
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn with_secret_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret_env.push((name.into(), value.into()));
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_setup(mut self, command: impl Into<String>) -> Self {
        self.setup.push(command.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Captured output of a successful container run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a command inside a container image and waits for it. A non-zero exit
/// is returned as [`crate::error::RelayError::Transfer`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput>;
}
