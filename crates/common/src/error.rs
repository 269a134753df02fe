//! Shared error types used across ims-artifacts crates.

use std::path::Path;

use thiserror::Error;

/// A local artifact file could not be opened or read.
///
/// Never retried: a missing or unreadable file will not fix itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Cannot access {path}: {message}")]
pub struct FileAccessError {
    /// Path that could not be accessed.
    pub path: String,
    /// Underlying I/O error message.
    pub message: String,
}

impl FileAccessError {
    /// Create a FileAccessError from std::io::Error.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `err` - The underlying IO error
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        Self {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
