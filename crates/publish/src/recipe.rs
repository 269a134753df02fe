//! Idempotent registration of recipe archives.
//!
//! A recipe is the same as an existing record when the name, the archive
//! checksum and the template dictionary all agree. Otherwise a draft of the
//! same name is completed, or a new record is created.

use std::path::Path;

use ims_artifacts_model::{
    ArtifactKind, NewRecipe, RecipePatch, RecipeRecord, TemplateDictionary, UploadResult,
    RECIPE_TYPE_KIWI_NG,
};
use ims_artifacts_storage::{
    checksum_in_background, ObjectUploader, RetrySettings, StorageClient, UploadTags,
};
use ims_artifacts_tracking::TrackingService;

use crate::error::PublishError;
use crate::image::{PublishOutcome, Resolution};
use crate::lookup::{Candidates, RecordLookup};
use crate::matcher::DuplicateMatcher;
use crate::rollback::RollbackCoordinator;

/// A recipe archive to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeSpec {
    /// Recipe name.
    pub name: String,
    /// Gzipped tar archive of the recipe.
    pub archive: std::path::PathBuf,
    /// Linux distribution the recipe builds, e.g. `sles15`.
    pub linux_distribution: String,
    /// Values substituted into the recipe at build time.
    pub template_dictionary: TemplateDictionary,
    pub require_dkms: Option<bool>,
    pub arch: Option<String>,
}

impl RecipeSpec {
    pub fn new(
        name: impl Into<String>,
        archive: impl AsRef<Path>,
        linux_distribution: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            archive: archive.as_ref().to_path_buf(),
            linux_distribution: linux_distribution.into(),
            template_dictionary: TemplateDictionary::new(),
            require_dkms: None,
            arch: None,
        }
    }

    /// Set the template dictionary.
    pub fn with_template_dictionary(mut self, template_dictionary: TemplateDictionary) -> Self {
        self.template_dictionary = template_dictionary;
        self
    }

    /// Set whether the recipe requires DKMS.
    pub fn with_require_dkms(mut self, require_dkms: bool) -> Self {
        self.require_dkms = Some(require_dkms);
        self
    }

    /// Set the target architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }
}

/// Uploads recipe archives and registers them with the tracking service.
pub struct RecipePublisher<'a, T: TrackingService, C: StorageClient> {
    tracking: &'a T,
    uploader: ObjectUploader<'a, C>,
}

impl<'a, T: TrackingService, C: StorageClient> RecipePublisher<'a, T, C> {
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

    /// Register `recipe`, uploading its archive unless an identical record exists.
    ///
    /// # Returns
    /// The linked record. `artifacts` holds the archive's upload result, or is
    /// empty when an identical recipe was already registered.
    ///
    /// # Errors
    /// The first failure, after any record this call touched has been rolled back.
    pub async fn publish(&self, recipe: &RecipeSpec) -> Result<PublishOutcome<RecipeRecord>, PublishError> {
        log::info!(
            "Publishing recipe {} from {} (distribution={}, template entries={})",
            recipe.name,
            recipe.archive.display(),
            recipe.linux_distribution,
            recipe.template_dictionary.len()
        );

        let candidates: Candidates<RecipeRecord> =
            Candidates::partition(self.tracking.recipes_named(&recipe.name).await?);

        if !matches!(candidates.published, RecordLookup::NotFound) {
            match checksum_in_background(&recipe.archive).await {
                Ok(checksum) => {
                    let matcher = DuplicateMatcher::new(self.uploader.client());
                    for record in candidates.published.into_candidates() {
                        if matcher
                            .recipe_matches(&record, &recipe.name, &checksum, &recipe.template_dictionary)
                            .await
                        {
                            log::info!(
                                "Recipe {} already registered as recipe_id={}; nothing to do",
                                recipe.name,
                                record.id
                            );
                            return Ok(PublishOutcome {
                                record,
                                artifacts: Vec::new(),
                                resolution: Resolution::ShortCircuit,
                            });
                        }
                    }
                }
                Err(e) => log::debug!("Cannot checksum recipe archive: {}", e),
            }
        }

        let (record, resolution) = match candidates.drafts.into_iter().next() {
            Some(draft) => {
                log::info!(
                    "Recipe {} exists as draft recipe_id={}; uploading now",
                    recipe.name,
                    draft.id
                );
                (draft, Resolution::DraftReused)
            }
            None => (self.create(recipe).await?, Resolution::Created),
        };

        match self.complete(&record, recipe, resolution).await {
            Ok((record, upload)) => {
                log::info!("Published recipe {} as recipe_id={}", recipe.name, record.id);
                Ok(PublishOutcome {
                    record,
                    artifacts: vec![upload],
                    resolution,
                })
            }
            Err(e) => {
                log::error!("Publishing recipe_id={} failed: {}", record.id, e);
                RollbackCoordinator::new(self.tracking, self.uploader.client(), self.uploader.bucket())
                    .rollback_recipe(&record.id, &recipe.name)
                    .await;
                Err(e)
            }
        }
    }

    async fn create(&self, recipe: &RecipeSpec) -> Result<RecipeRecord, PublishError> {
        let record: RecipeRecord = self
            .tracking
            .create_recipe(&NewRecipe {
                name: recipe.name.clone(),
                recipe_type: RECIPE_TYPE_KIWI_NG.to_string(),
                linux_distribution: recipe.linux_distribution.clone(),
                template_dictionary: recipe.template_dictionary.clone(),
                require_dkms: recipe.require_dkms,
                arch: recipe.arch.clone(),
            })
            .await?;
        log::info!("Created recipe record recipe_id={} for {}", record.id, recipe.name);
        Ok(record)
    }

    async fn complete(
        &self,
        record: &RecipeRecord,
        recipe: &RecipeSpec,
        resolution: Resolution,
    ) -> Result<(RecipeRecord, UploadResult), PublishError> {
        let key: String = ArtifactKind::RecipeArchive.object_key(&record.id);
        let upload: UploadResult = self
            .uploader
            .upload(
                ArtifactKind::RecipeArchive,
                &key,
                &recipe.archive,
                &UploadTags::checksum_only(),
            )
            .await?;

        let template_dictionary: Option<TemplateDictionary> = (resolution
            == Resolution::DraftReused
            && !recipe.template_dictionary.is_empty())
        .then(|| recipe.template_dictionary.clone());
        let patch: RecipePatch = RecipePatch {
            link: Some(upload.link.clone()),
            template_dictionary,
        };
        let linked: RecipeRecord = self.tracking.patch_recipe(&record.id, &patch).await?;
        Ok((linked, upload))
    }
}
