//! SHA-256 sidecar files and upload checksums.
//!
//! `checksum_dir` writes `<file>.sha256` next to every artifact in
//! `sha256sum` line format, so downloads can be verified with
//! `sha256sum -c`. `sha256_base64` produces the encoding object storage
//! expects in the `x-amz-checksum-sha256` header.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::listing::list_regular_files;

const SIDECAR_EXTENSION: &str = "sha256";

pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

pub fn sha256_base64(content: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(content))
}

/// Digest of the file at `path`, streamed without loading it whole.
fn file_digest(path: &Path) -> Result<Output<Sha256>> {
    let mut file = File::open(path).map_err(|e| RelayError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| RelayError::io(path, e))?;
    Ok(hasher.finalize())
}

/// Base64 SHA-256 of the file at `path`.
pub fn file_sha256_base64(path: &Path) -> Result<String> {
    Ok(STANDARD.encode(file_digest(path)?))
}

/// Writes a `.sha256` sidecar for every file below `dir` that is not itself
/// a sidecar. Existing sidecars are overwritten. Returns the written paths.
pub fn checksum_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    info!(dir = %dir.display(), "Generating SHA-256 checksums");
    let mut written = Vec::new();

    for file in list_regular_files(dir, usize::MAX)? {
        let rel = file.relative();
        if rel.ends_with(&format!(".{SIDECAR_EXTENSION}")) {
            continue;
        }
        let line = format!("{:x}  {}\n", file_digest(&file.path)?, rel);
        let sidecar = dir.join(format!("{rel}.{SIDECAR_EXTENSION}"));
        fs::write(&sidecar, line).map_err(|e| RelayError::io(&sidecar, e))?;
        debug!(file = %rel, "Wrote checksum");
        written.push(sidecar);
    }

    info!(count = written.len(), "Completed checksums");
    Ok(written)
}
