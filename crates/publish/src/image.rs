//! Idempotent publication of image artifacts.
//!
//! [`ArtifactPublisher::publish`] walks these states:
//!
//! ```text
//! Searching -> { ShortCircuit | DraftReused | Created }
//!           -> Uploading -> ManifestBuilding -> Linking -> (JobPatching) -> Done
//! ```
//!
//! Any failure after `Searching` rolls back the record and everything under
//! its `{id}/` prefix, then returns the original error.
//!
//! # Concurrency
//!
//! There is no lock around a name. Two publishers racing on the same name
//! with `skip_existing` can both miss each other's draft and create two
//! records. Serialize publishes per name above this layer if that matters.

use std::path::Path;

use ims_artifacts_common::FileAccessError;
use ims_artifacts_model::{
    ArtifactKind, ArtifactSpec, ImagePatch, ImageRecord, JobPatch, JobRecord, Manifest,
    NewImage, UploadResult,
};
use ims_artifacts_storage::{ObjectUploader, RetrySettings, StorageClient, UploadTags};
use ims_artifacts_tracking::TrackingService;
use tempfile::NamedTempFile;

use crate::error::PublishError;
use crate::lookup::{Candidates, RecordLookup};
use crate::matcher::{local_checksums, ChecksumSet, DuplicateMatcher};
use crate::rollback::RollbackCoordinator;

/// Options for [`ArtifactPublisher::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Reuse a matching published record or a draft of the same name.
    pub skip_existing: bool,
    /// Architecture recorded on the image.
    pub arch: Option<String>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether existing records are reused.
    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    /// Set the image architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }
}

/// How the record for a publish was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A published record already held the same content; nothing was uploaded.
    ShortCircuit,
    /// An existing draft of the same name was completed.
    DraftReused,
    /// A new record was created.
    Created,
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome<R> {
    /// The final record.
    pub record: R,
    /// Upload results in upload order, ending with the manifest entry when
    /// one was written. For a short circuit, the existing manifest's entries.
    pub artifacts: Vec<UploadResult>,
    /// How the record was obtained.
    pub resolution: Resolution,
}

/// Publishes image artifacts and registers them with the tracking service.
pub struct ArtifactPublisher<'a, T: TrackingService, C: StorageClient> {
    tracking: &'a T,
    uploader: ObjectUploader<'a, C>,
}

impl<'a, T: TrackingService, C: StorageClient> ArtifactPublisher<'a, T, C> {
    /// Create a publisher writing to `bucket`.
    pub fn new(tracking: &'a T, storage: &'a C, bucket: impl Into<String>) -> Self {
        Self {
            tracking,
            uploader: ObjectUploader::new(storage, bucket),
        }
    }

    /// Set upload retry settings.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.uploader = self.uploader.with_retry(retry);
        self
    }

    /// Publish `artifacts` as image `name`.
    ///
    /// # Arguments
    /// * `name` - Image name
    /// * `job_id` - Build job to point at the resulting image
    /// * `artifacts` - Files to publish, at most one per image artifact kind
    /// * `options` - Reuse policy and architecture
    ///
    /// # Returns
    /// The linked record and its artifact entries. With no artifacts, the bare
    /// record and no manifest.
    ///
    /// # Errors
    /// The first failure, after the record has been rolled back.
    pub async fn publish(
        &self,
        name: &str,
        job_id: Option<&str>,
        artifacts: &[ArtifactSpec],
        options: &PublishOptions,
    ) -> Result<PublishOutcome<ImageRecord>, PublishError> {
        let ordered: Vec<&ArtifactSpec> = order_artifacts(artifacts)?;
        log::info!(
            "Publishing image {} with {} artifacts (skip_existing={})",
            name,
            ordered.len(),
            options.skip_existing
        );

        let (record, resolution) = if options.skip_existing {
            match self.search(name, artifacts).await? {
                Searched::Existing(outcome) => return Ok(outcome),
                Searched::Draft(record) => (record, Resolution::DraftReused),
                Searched::Nothing => (self.create(name, options).await?, Resolution::Created),
            }
        } else {
            (self.create(name, options).await?, Resolution::Created)
        };

        if ordered.is_empty() {
            log::info!("No artifacts to upload for image_id={}", record.id);
            return Ok(PublishOutcome {
                record,
                artifacts: Vec::new(),
                resolution,
            });
        }

        match self.complete(&record, job_id, &ordered, options).await {
            Ok((record, artifacts)) => {
                log::info!(
                    "Published image {} as image_id={} ({} artifacts)",
                    name,
                    record.id,
                    artifacts.len()
                );
                Ok(PublishOutcome {
                    record,
                    artifacts,
                    resolution,
                })
            }
            Err(e) => {
                log::error!("Publishing image_id={} failed: {}", record.id, e);
                self.rollback().rollback_image(&record.id, name).await;
                Err(e)
            }
        }
    }

    /// Set a build job's status.
    pub async fn set_job_status(&self, job_id: &str, status: &str) -> Result<JobRecord, PublishError> {
        log::info!("Setting job {} status to {}", job_id, status);
        Ok(self.tracking.patch_job(job_id, &JobPatch::status(status)).await?)
    }

    /// Published images named `name`.
    pub async fn lookup_published(&self, name: &str) -> Result<RecordLookup<ImageRecord>, PublishError> {
        let images: Vec<ImageRecord> = self.tracking.images_named(name).await?;
        Ok(RecordLookup::from_records(images))
    }

    fn rollback(&self) -> RollbackCoordinator<'_, T, C> {
        RollbackCoordinator::new(self.tracking, self.uploader.client(), self.uploader.bucket())
    }

    async fn create(&self, name: &str, options: &PublishOptions) -> Result<ImageRecord, PublishError> {
        let record: ImageRecord = self
            .tracking
            .create_image(&NewImage {
                name: name.to_string(),
                arch: options.arch.clone(),
            })
            .await?;
        log::info!("Created image record image_id={} for {}", record.id, name);
        Ok(record)
    }

    async fn search(
        &self,
        name: &str,
        artifacts: &[ArtifactSpec],
    ) -> Result<Searched, PublishError> {
        let candidates: Candidates<ImageRecord> =
            Candidates::partition(self.tracking.images_named(name).await?);

        let published: Vec<ImageRecord> = match candidates.published {
            RecordLookup::NotFound => Vec::new(),
            RecordLookup::Found(record) => vec![record],
            RecordLookup::AmbiguousCandidates(records) => {
                log::debug!("{} published images named {}", records.len(), name);
                records
            }
        };

        if !published.is_empty() {
            match local_checksums(artifacts).await {
                Ok(checksums) => {
                    if let Some(outcome) = self.find_match(name, published, &checksums).await {
                        return Ok(Searched::Existing(outcome));
                    }
                }
                Err(e) => log::debug!("Cannot compare local artifacts for {}: {}", name, e),
            }
        }

        match candidates.drafts.into_iter().next() {
            Some(draft) => {
                log::info!("Reusing draft image record image_id={} for {}", draft.id, name);
                Ok(Searched::Draft(draft))
            }
            None => Ok(Searched::Nothing),
        }
    }

    async fn find_match(
        &self,
        name: &str,
        published: Vec<ImageRecord>,
        checksums: &ChecksumSet,
    ) -> Option<PublishOutcome<ImageRecord>> {
        let matcher = DuplicateMatcher::new(self.uploader.client());
        for record in published {
            if let Some(manifest) = matcher.matching_manifest(&record, name, checksums).await {
                log::info!(
                    "Image {} already published as image_id={}; nothing to upload",
                    name,
                    record.id
                );
                return Some(PublishOutcome {
                    record,
                    artifacts: manifest.artifacts,
                    resolution: Resolution::ShortCircuit,
                });
            }
        }
        None
    }

    /// Upload, write the manifest, link the record and patch the job.
    async fn complete(
        &self,
        record: &ImageRecord,
        job_id: Option<&str>,
        ordered: &[&ArtifactSpec],
        options: &PublishOptions,
    ) -> Result<(ImageRecord, Vec<UploadResult>), PublishError> {
        let tags: UploadTags = UploadTags::new(&record.id, &record.name).with_job_id(job_id);
        log::info!("Uploading {} files for image_id={}", ordered.len(), record.id);

        let mut results: Vec<UploadResult> = Vec::with_capacity(ordered.len() + 1);
        for artifact in ordered {
            let key: String = artifact.kind.object_key(&record.id);
            let result: UploadResult = self
                .uploader
                .upload(artifact.kind, &key, &artifact.local_path, &tags)
                .await?;
            results.push(result);
        }

        let manifest: Manifest = Manifest::build(results.clone());
        let manifest_result: UploadResult = self.upload_manifest(&record.id, &manifest).await?;
        log::info!(
            "Uploaded manifest for image_id={}; ims_job_id={}",
            record.id,
            job_id.unwrap_or("-")
        );

        let patch: ImagePatch = ImagePatch {
            link: Some(manifest_result.link.clone()),
            arch: options.arch.clone(),
        };
        let linked: ImageRecord = self.tracking.patch_image(&record.id, &patch).await?;

        if let Some(job_id) = job_id {
            self.tracking
                .patch_job(job_id, &JobPatch::resultant_image(&record.id))
                .await?;
        }

        results.push(manifest_result);
        Ok((linked, results))
    }

    async fn upload_manifest(
        &self,
        record_id: &str,
        manifest: &Manifest,
    ) -> Result<UploadResult, PublishError> {
        let file: NamedTempFile = NamedTempFile::new().map_err(|e| {
            PublishError::FileAccess(FileAccessError::from_io(Path::new("manifest.json"), e))
        })?;
        manifest.write_to(file.path())?;
        log::debug!("Manifest for image_id={}: {:?}", record_id, manifest);

        let key: String = ArtifactKind::Manifest.object_key(record_id);
        Ok(self
            .uploader
            .upload(
                ArtifactKind::Manifest,
                &key,
                file.path(),
                &UploadTags::checksum_only(),
            )
            .await?)
    }
}

enum Searched {
    Existing(PublishOutcome<ImageRecord>),
    Draft(ImageRecord),
    Nothing,
}

/// Sort artifacts into the fixed image order.
fn order_artifacts(artifacts: &[ArtifactSpec]) -> Result<Vec<&ArtifactSpec>, PublishError> {
    let mut ordered: Vec<(usize, &ArtifactSpec)> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let position: usize = artifact
            .kind
            .image_order()
            .ok_or_else(|| PublishError::unsupported_kind(artifact.kind))?;
        if ordered.iter().any(|(p, _)| *p == position) {
            return Err(PublishError::InvalidArtifacts {
                message: format!("{:?} supplied more than once", artifact.kind),
            });
        }
        ordered.push((position, artifact));
    }
    ordered.sort_by_key(|(position, _)| *position);
    Ok(ordered.into_iter().map(|(_, artifact)| artifact).collect())
}
