//! crates/noe_io/src/lib.rs
//! I/O edge of the nomination order engine.
//!
//! - `canonical_json`: sorted-key compact JSON bytes and atomic file writes
//! - `hasher`: SHA-256 digests, `ORD:` / `RUN:` ids, input fingerprints
//! - `manifest`: offline manifest naming the input files (+ optional digests)
//! - `loader`: candidate snapshots, policy files, previously published orders
//!
//! Everything here is local-filesystem only.

#![forbid(unsafe_code)]

use thiserror::Error;

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;

/// Unified error for noe_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse/shape errors, with a JSON Pointer when one is known.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Values that cannot be written canonically (e.g. floats).
    #[error("canonicalization error: {0}")]
    Canon(String),

    #[error("hash error: {0}")]
    Hash(String),

    /// Input exceeded a size limit.
    #[error("limit exceeded: {0}")]
    Limit(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    /// A supplied digest did not match the canonical bytes of its input.
    #[error("sha256 mismatch for {label}: expected={expected} got={got}")]
    DigestMismatch { label: &'static str, expected: String, got: String },

    /// Well-formed JSON with invalid content (duplicate ids, bad tokens).
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

/* ---------------- From conversions (used by file modules) ---------------- */

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json reports line/column, not a pointer.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

/// Returns true if `s` looks like a URL (any `<scheme>://`, or bare http(s):).
#[inline]
pub fn looks_like_url(s: &str) -> bool {
    let s = s.trim();
    s.contains("://") || s.starts_with("http:") || s.starts_with("https:")
}

pub mod prelude {
    pub use crate::canonical_json::{to_canonical_bytes, write_canonical};
    pub use crate::hasher::{input_fingerprint, order_id_for, sha256_hex};
    pub use crate::{IoError, IoResult};
}
