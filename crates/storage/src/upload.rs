//! Artifact upload with retry.
//!
//! [`ObjectUploader`] writes one local artifact to the object store, tags it
//! with its MD5 checksum and the owning record, and reads back the ETag the
//! store assigned. Transient store failures are retried according to
//! [`RetrySettings`]; fatal ones propagate immediately.
//!
//! # Example
//!
//! ```ignore
//! use ims_artifacts_storage::{ObjectUploader, UploadTags};
//!
//! let uploader = ObjectUploader::new(&client, "boot-images");
//! let tags = UploadTags::new(&record.id, &record.name);
//! let result = uploader.upload(ArtifactKind::Kernel, &key, &path, &tags).await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ims_artifacts_common::{checksum_file, FileAccessError};
use ims_artifacts_model::{ArtifactKind, ArtifactLink, UploadResult};

use crate::error::{StorageError, UploadError};
use crate::traits::{ObjectMetadata, StorageClient};
use crate::types::RetrySettings;

// ============================================================================
// Metadata keys
// ============================================================================

/// User metadata key holding the MD5 checksum of the uploaded file.
pub const METADATA_CHECKSUM: &str = "md5sum";

/// User metadata key holding the owning record's name.
pub const METADATA_RECORD_NAME: &str = "x-shasta-ims-image-name";

/// User metadata key holding the owning record's id.
pub const METADATA_RECORD_ID: &str = "x-shasta-ims-image-id";

/// User metadata key holding the build job id.
pub const METADATA_JOB_ID: &str = "x-shasta-ims-job-id";

/// Image identity attached to uploaded objects.
///
/// Image artifacts carry the image name and id; manifests and recipe
/// archives carry only the checksum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadTags {
    pub record_id: Option<String>,
    pub record_name: Option<String>,
    pub job_id: Option<String>,
}

impl UploadTags {
    /// Tags for an artifact belonging to image `record_id`.
    pub fn new(record_id: impl Into<String>, record_name: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            record_name: Some(record_name.into()),
            job_id: None,
        }
    }

    /// No record identity; objects get the checksum only.
    pub fn checksum_only() -> Self {
        Self::default()
    }

    /// Attach the build job id, if any.
    pub fn with_job_id(mut self, job_id: Option<impl Into<String>>) -> Self {
        self.job_id = job_id.map(Into::into);
        self
    }

    /// Object metadata carrying these tags and `checksum`.
    pub fn metadata(&self, checksum: &str) -> HashMap<String, String> {
        let mut metadata: HashMap<String, String> = HashMap::new();
        metadata.insert(METADATA_CHECKSUM.to_string(), checksum.to_string());
        if let Some(ref record_name) = self.record_name {
            metadata.insert(METADATA_RECORD_NAME.to_string(), record_name.clone());
        }
        if let Some(ref record_id) = self.record_id {
            metadata.insert(METADATA_RECORD_ID.to_string(), record_id.clone());
        }
        if let Some(ref job_id) = self.job_id {
            metadata.insert(METADATA_JOB_ID.to_string(), job_id.clone());
        }
        metadata
    }
}

// ============================================================================
// Uploader
// ============================================================================

/// Uploads single artifacts to one bucket.
pub struct ObjectUploader<'a, C: StorageClient> {
    client: &'a C,
    bucket: String,
    retry: RetrySettings,
}

impl<'a, C: StorageClient> ObjectUploader<'a, C> {
    /// Create an uploader with the default retry settings.
    pub fn new(client: &'a C, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            retry: RetrySettings::default(),
        }
    }

    /// Set retry settings.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Bucket this uploader writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Client this uploader writes through.
    pub fn client(&self) -> &'a C {
        self.client
    }

    /// Upload `local_path` to `key` as an artifact of `kind`.
    ///
    /// The checksum is computed from the local file before anything is sent.
    ///
    /// # Arguments
    /// * `kind` - Artifact kind; selects the content type
    /// * `key` - Destination object key
    /// * `local_path` - File to upload
    /// * `tags` - Record identity stored as object metadata
    ///
    /// # Returns
    /// The manifest entry for the stored object.
    ///
    /// # Errors
    /// * `UploadError::FileAccess` if the local file cannot be read
    /// * `UploadError::Fatal` on the first fatal store error
    /// * `UploadError::Transient` once the retry settings give up
    pub async fn upload(
        &self,
        kind: ArtifactKind,
        key: &str,
        local_path: &Path,
        tags: &UploadTags,
    ) -> Result<UploadResult, UploadError> {
        let checksum: String = checksum_in_background(local_path).await?;
        let metadata: HashMap<String, String> = tags.metadata(&checksum);

        log::debug!(
            "Uploading {} to s3://{}/{} (image_id={})",
            local_path.display(),
            self.bucket,
            key,
            tags.record_id.as_deref().unwrap_or("-")
        );

        let mut attempt: u32 = 1;
        loop {
            match self.put_and_read_etag(kind, key, local_path, &metadata).await {
                Ok(etag) => {
                    let link: ArtifactLink = ArtifactLink::s3(&self.bucket, key, etag);
                    return Ok(UploadResult::new(kind, link, checksum));
                }
                Err(e) if e.is_fatal() => {
                    return Err(UploadError::Fatal {
                        key: key.to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    if !self.retry.allows_retry_after(attempt) {
                        return Err(UploadError::Transient {
                            key: key.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.retry.backoff_for(attempt);
                    log::warn!(
                        "Upload of {} failed on attempt {}, retrying in {:?}: {}",
                        key,
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn put_and_read_etag(
        &self,
        kind: ArtifactKind,
        key: &str,
        local_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<String, StorageError> {
        self.client
            .put_object_from_file(
                &self.bucket,
                key,
                local_path,
                Some(kind.mime_type()),
                Some(metadata),
            )
            .await?;

        let head: ObjectMetadata = self
            .client
            .head_object(&self.bucket, key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })?;

        head.etag_unquoted().ok_or_else(|| StorageError::Other {
            message: format!("No ETag returned for s3://{}/{}", self.bucket, key),
        })
    }
}

/// Checksum a file on the blocking pool.
///
/// # Errors
/// Returns `FileAccessError` if the file cannot be read or the blocking task
/// fails.
pub async fn checksum_in_background(path: &Path) -> Result<String, FileAccessError> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || checksum_file(&owned))
        .await
        .map_err(|e| FileAccessError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
}
