//! The tracking-service interface consumed by publishers.

use async_trait::async_trait;
use ims_artifacts_model::{
    ImagePatch, ImageRecord, JobPatch, JobRecord, NewImage, NewRecipe, RecipePatch, RecipeRecord,
};

use crate::error::TrackingError;

/// Record-tracking service operations.
///
/// Implementations apply their own transport policy; callers treat every
/// error as final.
#[async_trait]
pub trait TrackingService: Send + Sync {
    /// Create an image record. The service assigns the id.
    async fn create_image(&self, image: &NewImage) -> Result<ImageRecord, TrackingError>;

    /// List all image records, in the order the service returns them.
    async fn list_images(&self) -> Result<Vec<ImageRecord>, TrackingError>;

    /// Fetch one image record.
    async fn get_image(&self, id: &str) -> Result<ImageRecord, TrackingError>;

    /// Patch an image record and return the updated record.
    async fn patch_image(&self, id: &str, patch: &ImagePatch)
        -> Result<ImageRecord, TrackingError>;

    /// Delete an image record.
    async fn delete_image(&self, id: &str) -> Result<(), TrackingError>;

    /// Create a recipe record.
    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<RecipeRecord, TrackingError>;

    /// List all recipe records.
    async fn list_recipes(&self) -> Result<Vec<RecipeRecord>, TrackingError>;

    /// Patch a recipe record and return the updated record.
    async fn patch_recipe(
        &self,
        id: &str,
        patch: &RecipePatch,
    ) -> Result<RecipeRecord, TrackingError>;

    /// Delete a recipe record.
    async fn delete_recipe(&self, id: &str) -> Result<(), TrackingError>;

    /// Patch a job record.
    async fn patch_job(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, TrackingError>;

    /// Images named exactly `name`.
    async fn images_named(&self, name: &str) -> Result<Vec<ImageRecord>, TrackingError> {
        Ok(self
            .list_images()
            .await?
            .into_iter()
            .filter(|image| image.name == name)
            .collect())
    }

    /// Recipes named exactly `name`.
    async fn recipes_named(&self, name: &str) -> Result<Vec<RecipeRecord>, TrackingError> {
        Ok(self
            .list_recipes()
            .await?
            .into_iter()
            .filter(|recipe| recipe.name == name)
            .collect())
    }
}
