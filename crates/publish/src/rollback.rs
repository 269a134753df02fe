//! Best-effort compensation after a failed publish.

use ims_artifacts_model::ArtifactKind;
use ims_artifacts_storage::StorageClient;
use ims_artifacts_tracking::TrackingService;

/// What a rollback managed to remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// The tracking record was deleted.
    pub record_deleted: bool,
    /// Objects removed from the record's prefix; None if listing or deleting failed.
    pub objects_removed: Option<usize>,
}

impl RollbackReport {
    /// Whether both the record and its objects are gone.
    pub fn is_complete(&self) -> bool {
        self.record_deleted && self.objects_removed.is_some()
    }
}

/// Deletes a record and everything stored under its prefix.
///
/// Failures are logged and swallowed so the caller can report the error
/// that triggered the rollback.
pub struct RollbackCoordinator<'a, T: TrackingService, C: StorageClient> {
    tracking: &'a T,
    storage: &'a C,
    bucket: &'a str,
}

impl<'a, T: TrackingService, C: StorageClient> RollbackCoordinator<'a, T, C> {
    pub fn new(tracking: &'a T, storage: &'a C, bucket: &'a str) -> Self {
        Self {
            tracking,
            storage,
            bucket,
        }
    }

    /// Remove an image record and its `{id}/` prefix.
    pub async fn rollback_image(&self, record_id: &str, name: &str) -> RollbackReport {
        log::info!("Removing image_id={}; image_name={}", record_id, name);
        let record_deleted: bool = match self.tracking.delete_image(record_id).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not delete image record {}: {}", record_id, e);
                false
            }
        };
        let prefix: String = ArtifactKind::Rootfs.record_prefix(record_id);
        RollbackReport {
            record_deleted,
            objects_removed: self.delete_prefix(&prefix).await,
        }
    }

    /// Remove a recipe record and its `recipes/{id}/` prefix.
    pub async fn rollback_recipe(&self, record_id: &str, name: &str) -> RollbackReport {
        log::info!("Removing recipe_id={}; recipe_name={}", record_id, name);
        let record_deleted: bool = match self.tracking.delete_recipe(record_id).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not delete recipe record {}: {}", record_id, e);
                false
            }
        };
        let prefix: String = ArtifactKind::RecipeArchive.record_prefix(record_id);
        RollbackReport {
            record_deleted,
            objects_removed: self.delete_prefix(&prefix).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Option<usize> {
        match self.storage.delete_prefix(self.bucket, prefix).await {
            Ok(removed) => {
                log::debug!("Removed {} objects under s3://{}/{}", removed, self.bucket, prefix);
                Some(removed)
            }
            Err(e) => {
                log::warn!(
                    "Could not remove objects under s3://{}/{}: {}",
                    self.bucket,
                    prefix,
                    e
                );
                None
            }
        }
    }
}
