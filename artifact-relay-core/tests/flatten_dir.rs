use std::fs::{self, create_dir_all};

use artifact_relay_core::checksum::checksum_dir;
use artifact_relay_core::flatten::{flatten_dir, read_tree, FlattenMode, LAYOUT_DEPTH};
use tempfile::tempdir;

#[test]
fn test_flatten_dir_renames_os_arch_tree_into_flat_dir() {
    let build = tempdir().unwrap();
    let dist = tempdir().unwrap();

    create_dir_all(build.path().join("darwin/arm64")).unwrap();
    create_dir_all(build.path().join("linux/amd64")).unwrap();
    fs::write(build.path().join("darwin/arm64/tapes"), "mac").unwrap();
    fs::write(build.path().join("linux/amd64/tapes"), "linux").unwrap();
    // Not part of the layout; skipped.
    fs::write(build.path().join("NOTES.txt"), "notes").unwrap();

    let written = flatten_dir(build.path(), dist.path(), FlattenMode::Lenient)
        .expect("flatten should succeed");

    assert_eq!(written, ["tapes-darwin-arm64", "tapes-linux-amd64"]);
    assert_eq!(fs::read_to_string(dist.path().join("tapes-darwin-arm64")).unwrap(), "mac");
    assert_eq!(fs::read_to_string(dist.path().join("tapes-linux-amd64")).unwrap(), "linux");
    assert!(!dist.path().join("NOTES.txt").exists());
}

#[test]
fn test_checksum_then_flatten_keeps_sidecars_paired() {
    let build = tempdir().unwrap();
    let dist = tempdir().unwrap();

    create_dir_all(build.path().join("linux/arm64")).unwrap();
    fs::write(build.path().join("linux/arm64/tapes"), "bin").unwrap();

    checksum_dir(build.path()).expect("checksum should succeed");
    let written = flatten_dir(build.path(), dist.path(), FlattenMode::Strict)
        .expect("flatten should succeed");

    assert_eq!(written, ["tapes-linux-arm64", "tapes-linux-arm64.sha256"]);
    let sidecar = fs::read_to_string(dist.path().join("tapes-linux-arm64.sha256")).unwrap();
    assert!(sidecar.ends_with("  linux/arm64/tapes\n"), "got: {sidecar}");
}

#[test]
fn test_flattening_an_already_flat_dir_writes_nothing() {
    let build = tempdir().unwrap();
    let dist = tempdir().unwrap();
    fs::write(build.path().join("tapes-linux-amd64"), "bin").unwrap();

    let written = flatten_dir(build.path(), dist.path(), FlattenMode::Lenient).unwrap();
    assert!(written.is_empty());
    assert_eq!(fs::read_dir(dist.path()).unwrap().count(), 0);
}

#[test]
fn test_read_tree_lists_files_at_every_depth() {
    let root = tempdir().unwrap();
    create_dir_all(root.path().join("a/b/c")).unwrap();
    fs::write(root.path().join("top"), "1").unwrap();
    fs::write(root.path().join("a/b/c/deep"), "2").unwrap();

    let entries = read_tree(root.path(), usize::MAX).unwrap();
    let paths: Vec<String> = entries.iter().map(|e| e.path()).collect();
    assert_eq!(paths, ["a/b/c/deep", "top"]);
}

#[test]
fn test_read_tree_stops_at_the_requested_depth() {
    let root = tempdir().unwrap();
    create_dir_all(root.path().join("linux/amd64/debug")).unwrap();
    fs::write(root.path().join("linux/amd64/tapes"), "bin").unwrap();
    fs::write(root.path().join("linux/amd64/debug/tapes.dwarf"), "symbols").unwrap();

    let entries = read_tree(root.path(), LAYOUT_DEPTH).unwrap();
    let paths: Vec<String> = entries.iter().map(|e| e.path()).collect();
    assert_eq!(paths, ["linux/amd64/tapes"]);
}

#[cfg(unix)]
#[test]
fn test_flatten_dir_never_opens_files_below_the_layout() {
    use std::os::unix::fs::PermissionsExt;

    let build = tempdir().unwrap();
    let dist = tempdir().unwrap();
    create_dir_all(build.path().join("linux/amd64/debug")).unwrap();
    fs::write(build.path().join("linux/amd64/tapes"), "bin").unwrap();
    // Unreadable, so any attempt to load it would fail the run.
    let deep = build.path().join("linux/amd64/debug/tapes.dwarf");
    fs::write(&deep, "symbols").unwrap();
    fs::set_permissions(&deep, fs::Permissions::from_mode(0o000)).unwrap();

    let written = flatten_dir(build.path(), dist.path(), FlattenMode::Strict)
        .expect("depth-4 files are outside the layout listing");
    assert_eq!(written, ["tapes-linux-amd64"]);
}
