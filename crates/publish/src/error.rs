//! Error types for publication.

use ims_artifacts_common::FileAccessError;
use ims_artifacts_model::{ArtifactKind, ManifestError};
use ims_artifacts_storage::{StorageError, UploadError};
use ims_artifacts_tracking::TrackingError;
use thiserror::Error;

/// Errors returned by the publishers.
///
/// A failed publish surfaces exactly one of these, carrying the original
/// cause; errors hit while rolling back are logged and never replace it.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A local artifact could not be read.
    #[error(transparent)]
    FileAccess(#[from] FileAccessError),

    /// The object store kept failing transiently until retries ran out.
    #[error("Upload of {key} gave up after {attempts} attempts: {source}")]
    TransientStore {
        key: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// The object store rejected an operation in a way retrying cannot fix.
    #[error("Object store rejected {key}: {source}")]
    FatalStore {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The tracking service returned an error.
    #[error("Tracking service error: {0}")]
    TrackingService(#[from] TrackingError),

    /// More than one published record carries the name.
    #[error("{} published records are named {name:?}: {ids:?}", ids.len())]
    DuplicateCandidates { name: String, ids: Vec<String> },

    /// The manifest could not be encoded or written.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The artifact set cannot be published as given.
    #[error("Invalid artifact set: {message}")]
    InvalidArtifacts { message: String },
}

impl PublishError {
    pub(crate) fn unsupported_kind(kind: ArtifactKind) -> Self {
        PublishError::InvalidArtifacts {
            message: format!("{:?} is not an image artifact", kind),
        }
    }
}

impl From<UploadError> for PublishError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::FileAccess(e) => PublishError::FileAccess(e),
            UploadError::Transient {
                key,
                attempts,
                source,
            } => PublishError::TransientStore {
                key,
                attempts,
                source,
            },
            UploadError::Fatal { key, source } => PublishError::FatalStore { key, source },
        }
    }
}
