//! ea_io: local snapshot I/O for the allotment engine.
//!
//! - One shared error type (`IoError`) with `From` conversions used across modules.
//! - Canonical JSON, hashing and ID builders, embedded schemas, run manifests, loaders.
//! - Offline only: every path is a local file; URLs are rejected.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for ea_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse/serialize errors with a JSON Pointer hint.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Input failed its embedded JSON Schema.
    #[error("schema error at {pointer}: {msg}")]
    Schema { pointer: String, msg: String },

    /// Manifest shape or offline-policy violation.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// A declared input digest does not match the file.
    #[error("sha256 mismatch for {label}: expected={expected} got={got}")]
    DigestMismatch {
        label: &'static str,
        expected: String,
        got: String,
    },

    /// `expect.*` in the manifest does not match this engine.
    #[error("expectation mismatch for {0}: {1}")]
    Expectation(&'static str, String),

    #[error("hash error: {0}")]
    Hash(String),

    /// Generic validation / invariants.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps line/column, not a pointer; callers may enrich.
        IoError::Json {
            pointer: "/".to_string(),
            msg: e.to_string(),
        }
    }
}

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod schema;

/// Returns true if `s` looks like a URL (any `<scheme>://`, plus bare `http:`/`https:`).
#[inline]
pub fn looks_like_url(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}

pub mod prelude {
    pub use crate::{looks_like_url, IoError, IoResult};

    pub use crate::canonical_json::{to_canonical_bytes, write_canonical_file};
    pub use crate::hasher::{alt_id, run_id, sha256_canonical, sha256_hex};
    pub use crate::loader::{load_from_manifest, load_resolved, LoadedSnapshot, SnapshotDigests};
    pub use crate::manifest::{load_manifest, resolve_paths, ResolvedManifest, RunManifest, RunMode};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(looks_like_url("https://example.org/x.json"));
        assert!(looks_like_url("file:///tmp/x.json"));
        assert!(looks_like_url(" http:x"));
        assert!(!looks_like_url("data/students.json"));
        assert!(!looks_like_url("C:\\snap\\students.json"));
    }
}
