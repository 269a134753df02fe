//! Manifest codec errors.

use thiserror::Error;

/// Errors produced while encoding or decoding a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document is not valid manifest JSON.
    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The manifest declares a version this crate cannot read.
    #[error("Unsupported manifest version {version:?}, expected {expected:?}")]
    UnsupportedVersion {
        version: String,
        expected: &'static str,
    },

    /// The manifest could not be written to or read from disk.
    #[error("Manifest I/O error for {path}: {message}")]
    Io { path: String, message: String },
}
