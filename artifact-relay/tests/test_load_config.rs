use artifact_relay::load_config::{load_config, RelayConfig};
use artifact_relay_core::flatten::FlattenMode;
use artifact_relay_core::metadata::MetadataIndex;
use artifact_relay_core::transport::AWS_CLI_IMAGE;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Creating temp config file failed");
    file.write_all(yaml.as_bytes())
        .expect("Writing temp config failed");
    file
}

#[test]
fn test_load_full_config() {
    let file = config_file(
        r#"
runtime: podman
flatten_mode: strict
images:
  alpine: alpine:3.20
metadata:
  - path: ./bin/app
    content_type: application/octet-stream
    checksum_sha256: "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
  - path: install.sh
    content_type: text/x-shellscript
"#,
    );

    let config = load_config(Some(file.path())).expect("Config should load");

    assert_eq!(config.runtime, "podman");
    assert_eq!(config.flatten_mode, FlattenMode::Strict);
    assert_eq!(config.images.alpine, "alpine:3.20");
    // Unset images keep their defaults.
    assert_eq!(config.images.aws_cli, AWS_CLI_IMAGE);
    assert_eq!(config.metadata.len(), 2);

    let index = MetadataIndex::build(&config.metadata);
    let app = index.get(&"bin/app".into()).expect("normalised key");
    assert_eq!(app.content_type(), Some("application/octet-stream"));
    assert_eq!(
        app.checksum_sha256(),
        Some("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=")
    );
    assert_eq!(index.get(&"install.sh".into()).unwrap().checksum_sha256(), None);
}

#[test]
fn test_no_path_yields_defaults() {
    let config = load_config(None::<PathBuf>).unwrap();
    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.runtime, "docker");
    assert_eq!(config.flatten_mode, FlattenMode::Lenient);
}

#[test]
fn test_empty_file_yields_defaults() {
    let file = config_file("");
    assert_eq!(load_config(Some(file.path())).unwrap(), RelayConfig::default());
}

#[test]
fn test_unknown_key_is_rejected() {
    let file = config_file("bucket: artifacts\n");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(
        err.to_string().contains("Failed to parse config YAML"),
        "got: {err}"
    );
}

#[test]
fn test_unknown_flatten_mode_is_rejected() {
    let file = config_file("flatten_mode: sloppy\n");
    assert!(load_config(Some(file.path())).is_err());
}

#[test]
fn test_empty_runtime_is_rejected() {
    let file = config_file("runtime: \"\"\n");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("runtime"), "got: {err}");
}

#[test]
fn test_missing_file_is_reported() {
    let err = load_config(Some("/no/such/relay.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
