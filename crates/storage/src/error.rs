//! Error types for storage operations.

use ims_artifacts_common::FileAccessError;
use thiserror::Error;

/// Errors that can occur during object-store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Object not found.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Size mismatch (corruption or incomplete transfer).
    #[error("Size mismatch for {key}: expected {expected} bytes, got {actual}")]
    SizeMismatch { key: String, expected: u64, actual: u64 },

    /// Downloaded file does not have the expected checksum.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Network or service error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Whether this error means the operation cannot succeed no matter how
    /// often it is repeated (authorization, configuration, local files).
    pub fn is_fatal(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => !*retryable,
            StorageError::AccessDenied { .. } => true,
            StorageError::InvalidConfig { .. } => true,
            StorageError::IoError { .. } => true,
            StorageError::ChecksumMismatch { .. } => true,
            StorageError::NotFound { .. } => false,
            StorageError::SizeMismatch { .. } => false,
            StorageError::Other { .. } => false,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }

    pub(crate) fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        StorageError::IoError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<FileAccessError> for StorageError {
    fn from(err: FileAccessError) -> Self {
        StorageError::IoError {
            path: err.path,
            message: err.message,
        }
    }
}

/// Errors returned by [`crate::ObjectUploader::upload`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The local artifact could not be read; nothing was sent to the store.
    #[error(transparent)]
    FileAccess(#[from] FileAccessError),

    /// The store kept failing with transient errors until the retry policy
    /// gave up.
    #[error("Upload of {key} gave up after {attempts} attempts: {source}")]
    Transient {
        key: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// The store rejected the upload in a way retrying cannot fix.
    #[error("Upload of {key} failed: {source}")]
    Fatal {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    /// The object key involved, if the store was reached.
    pub fn key(&self) -> Option<&str> {
        match self {
            UploadError::FileAccess(_) => None,
            UploadError::Transient { key, .. } | UploadError::Fatal { key, .. } => Some(key.as_str()),
        }
    }
}
