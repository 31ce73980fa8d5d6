#![doc = "artifact-relay-core: core logic library for artifact-relay."]

//! Everything that decides *what* happens to build artifacts lives here:
//! flattening `<os>/<arch>/<filename>` trees, indexing per-file upload
//! metadata, choosing bulk or per-file copies, and the container-backed
//! transports that carry the copies out.
//!
//! The CLI crate only parses arguments, loads configuration and resolves
//! credentials before calling into this crate.
//!
//! # Usage
//! Implement [`contract::CopyTransport`] or [`contract::ContainerRunner`] to
//! point the pipeline at another tool; mocks for both are exported behind the
//! `test-export-mocks` feature.

pub mod checksum;
pub mod contract;
pub mod error;
pub mod flatten;
pub mod lint;
pub mod listing;
pub mod metadata;
pub mod plan;
pub mod release;
pub mod runner;
pub mod transport;
pub mod upload;

pub use error::{RelayError, Result};
