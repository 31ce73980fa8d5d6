//! [`ContainerRunner`] backed by the `docker` CLI (or any CLI that accepts
//! the same `run` flags, such as `podman`).
//!
//! Secret values never appear on the command line: the container receives
//! `-e NAME` and the value is inherited from the child process environment.
//! The child is killed if the returned future is dropped, which is how a
//! caller's cancellation reaches the running tool.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::contract::{ContainerOutput, ContainerRunner, ContainerSpec};
use crate::error::{RelayError, Result};

const DEFAULT_BINARY: &str = "docker";

#[derive(Debug, Clone)]
pub struct DockerRunner {
    binary: String,
}

impl Default for DockerRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerRunner {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
        }
    }

    /// Use another compatible CLI, e.g. `podman`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

/// Arguments passed to `docker` for `spec`, starting at `run`.
pub fn docker_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];

    for mount in &spec.mounts {
        args.push("-v".into());
        args.push(format!("{}:{}", mount.host.display(), mount.container));
    }
    for cache in &spec.caches {
        args.push("-v".into());
        args.push(format!("{}:{}", cache.name, cache.container));
    }
    for (name, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{name}={value}"));
    }
    for (name, _) in &spec.secret_env {
        args.push("-e".into());
        args.push(name.clone());
    }
    if let Some(workdir) = &spec.workdir {
        args.push("-w".into());
        args.push(workdir.clone());
    }

    // Images such as amazon/aws-cli ship their own entrypoint, so it is
    // always replaced.
    if spec.setup.is_empty() {
        let (program, rest) = match spec.args.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };
        args.push("--entrypoint".into());
        args.push(program);
        args.push(spec.image.clone());
        args.extend(rest);
    } else {
        let mut script = spec.setup.join(" && ");
        if !spec.args.is_empty() {
            let command: Vec<String> = spec.args.iter().map(|a| shell_quote(a)).collect();
            script.push_str(" && ");
            script.push_str(&command.join(" "));
        }
        args.push("--entrypoint".into());
        args.push("sh".into());
        args.push(spec.image.clone());
        args.push("-c".into());
        args.push(script);
    }

    args
}

/// Single-quotes `arg` for `sh` unless it only contains safe characters.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput> {
        let step = format!("{} run {}", self.binary, spec.image);
        if let Some(mount) = spec.mounts.iter().find(|m| !m.host.is_absolute()) {
            error!(host = %mount.host.display(), "Bind mount source is not absolute");
            return Err(RelayError::configuration(format!(
                "bind mount source {} must be an absolute path",
                mount.host.display()
            )));
        }
        let args = docker_args(spec);
        info!(image = %spec.image, command = ?spec.args, "Running container");
        debug!(binary = %self.binary, ?args, "Container invocation");

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in &spec.secret_env {
            command.env(name, value);
        }

        let output = command.output().await.map_err(|e| {
            error!(binary = %self.binary, error = ?e, "Failed to launch container runtime");
            RelayError::transfer(&step, format!("failed to launch {}: {e}", self.binary))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(
                image = %spec.image,
                status = %output.status,
                stderr = %stderr.trim(),
                "Container exited with non-zero code"
            );
            return Err(RelayError::transfer(
                step,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        debug!(image = %spec.image, stdout_len = stdout.len(), "Container finished");
        Ok(ContainerOutput { stdout, stderr })
    }
}
