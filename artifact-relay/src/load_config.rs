/// `load_config` module: loads the optional YAML configuration that tunes the pipeline steps.
///
/// The file holds no secrets. Credentials are resolved separately from the
/// environment (see [`crate::credentials`]).
///
/// # Accepted YAML
/// ```yaml
/// runtime: docker            # or podman
/// flatten_mode: lenient      # or strict
/// images:
///   aws_cli: amazon/aws-cli:latest
///   alpine: alpine:latest
///   golangci_lint: golangci/golangci-lint:v2.8.0
/// metadata:
///   - path: bin/app
///     content_type: application/octet-stream
///     checksum_sha256: "base64..."
/// ```
/// Every key is optional.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use artifact_relay_core::flatten::FlattenMode;
use artifact_relay_core::lint::GOLANGCI_LINT_IMAGE;
use artifact_relay_core::metadata::FilePathMetadata;
use artifact_relay_core::transport::{ALPINE_IMAGE, AWS_CLI_IMAGE};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Container CLI used to run tool images.
    pub runtime: String,
    pub flatten_mode: FlattenMode,
    pub images: ImageSection,
    /// Per-file upload headers applied by the bucket upload commands.
    pub metadata: Vec<FilePathMetadata>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            flatten_mode: FlattenMode::default(),
            images: ImageSection::default(),
            metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSection {
    pub aws_cli: String,
    pub alpine: String,
    pub golangci_lint: String,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            aws_cli: AWS_CLI_IMAGE.to_string(),
            alpine: ALPINE_IMAGE.to_string(),
            golangci_lint: GOLANGCI_LINT_IMAGE.to_string(),
        }
    }
}

/// Loads the YAML config at `path`, or the defaults when no path is given.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<RelayConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(RelayConfig::default());
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, all-defaults config.
    if config_content.trim().is_empty() {
        return Ok(RelayConfig::default());
    }

    let config: RelayConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if config.runtime.trim().is_empty() {
        return Err(anyhow::anyhow!("Config field `runtime` must not be empty"));
    }

    info!(
        runtime = %config.runtime,
        flatten_mode = ?config.flatten_mode,
        metadata_entries = config.metadata.len(),
        "Loaded config"
    );
    Ok(config)
}
