//! In-memory [`TrackingService`] for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ims_artifacts_model::{
    ImagePatch, ImageRecord, JobPatch, JobRecord, NewImage, NewRecipe, RecipePatch, RecipeRecord,
};

use crate::error::TrackingError;
use crate::service::TrackingService;

/// Call counts recorded by [`MemoryTrackingService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub image_creates: usize,
    pub image_patches: usize,
    pub image_deletes: usize,
    pub recipe_creates: usize,
    pub recipe_patches: usize,
    pub recipe_deletes: usize,
    pub job_patches: usize,
}

#[derive(Debug, Default)]
struct State {
    images: Vec<ImageRecord>,
    recipes: Vec<RecipeRecord>,
    jobs: HashMap<String, JobRecord>,
    calls: CallCounts,
    fail_deletes: bool,
}

/// Tracking service held entirely in memory.
///
/// Records are listed in creation order. Ids are random UUIDs.
#[derive(Debug, Default)]
pub struct MemoryTrackingService {
    state: Mutex<State>,
}

impl MemoryTrackingService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an image record as-is.
    pub fn insert_image(&self, image: ImageRecord) {
        self.state().images.push(image);
    }

    /// Add a recipe record as-is.
    pub fn insert_recipe(&self, recipe: RecipeRecord) {
        self.state().recipes.push(recipe);
    }

    /// Add a job record.
    pub fn insert_job(&self, id: impl Into<String>) {
        let id: String = id.into();
        self.state().jobs.insert(
            id.clone(),
            JobRecord {
                id,
                status: None,
                resultant_image_id: None,
            },
        );
    }

    /// Snapshot of all image records.
    pub fn images(&self) -> Vec<ImageRecord> {
        self.state().images.clone()
    }

    /// Snapshot of all recipe records.
    pub fn recipes(&self) -> Vec<RecipeRecord> {
        self.state().recipes.clone()
    }

    /// A job record, if present.
    pub fn job(&self, id: &str) -> Option<JobRecord> {
        self.state().jobs.get(id).cloned()
    }

    /// Calls made so far.
    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Make every delete call fail with a 500.
    pub fn fail_deletes(&self) {
        self.state().fail_deletes = true;
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn server_error(method: &str, url: String) -> TrackingError {
    TrackingError::Status {
        method: method.to_string(),
        url,
        status: 500,
        body: "Internal Server Error".to_string(),
    }
}

#[async_trait]
impl TrackingService for MemoryTrackingService {
    async fn create_image(&self, image: &NewImage) -> Result<ImageRecord, TrackingError> {
        let record: ImageRecord = ImageRecord {
            id: new_id(),
            name: image.name.clone(),
            created: None,
            link: None,
            arch: image.arch.clone(),
        };
        let mut state = self.state();
        state.calls.image_creates += 1;
        state.images.push(record.clone());
        Ok(record)
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, TrackingError> {
        Ok(self.images())
    }

    async fn get_image(&self, id: &str) -> Result<ImageRecord, TrackingError> {
        self.state()
            .images
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| TrackingError::not_found("GET", format!("images/{}", id)))
    }

    async fn patch_image(
        &self,
        id: &str,
        patch: &ImagePatch,
    ) -> Result<ImageRecord, TrackingError> {
        let mut state = self.state();
        state.calls.image_patches += 1;
        let image: &mut ImageRecord = state
            .images
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| TrackingError::not_found("PATCH", format!("images/{}", id)))?;
        if let Some(ref link) = patch.link {
            image.link = Some(link.clone());
        }
        if let Some(ref arch) = patch.arch {
            image.arch = Some(arch.clone());
        }
        Ok(image.clone())
    }

    async fn delete_image(&self, id: &str) -> Result<(), TrackingError> {
        let mut state = self.state();
        state.calls.image_deletes += 1;
        if state.fail_deletes {
            return Err(server_error("DELETE", format!("images/{}", id)));
        }
        let before: usize = state.images.len();
        state.images.retain(|i| i.id != id);
        if state.images.len() == before {
            return Err(TrackingError::not_found("DELETE", format!("images/{}", id)));
        }
        Ok(())
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<RecipeRecord, TrackingError> {
        let record: RecipeRecord = RecipeRecord {
            id: new_id(),
            name: recipe.name.clone(),
            recipe_type: Some(recipe.recipe_type.clone()),
            linux_distribution: Some(recipe.linux_distribution.clone()),
            template_dictionary: recipe.template_dictionary.clone(),
            require_dkms: recipe.require_dkms,
            arch: recipe.arch.clone(),
            link: None,
        };
        let mut state = self.state();
        state.calls.recipe_creates += 1;
        state.recipes.push(record.clone());
        Ok(record)
    }

    async fn list_recipes(&self) -> Result<Vec<RecipeRecord>, TrackingError> {
        Ok(self.recipes())
    }

    async fn patch_recipe(
        &self,
        id: &str,
        patch: &RecipePatch,
    ) -> Result<RecipeRecord, TrackingError> {
        let mut state = self.state();
        state.calls.recipe_patches += 1;
        let recipe: &mut RecipeRecord = state
            .recipes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| TrackingError::not_found("PATCH", format!("recipes/{}", id)))?;
        if let Some(ref link) = patch.link {
            recipe.link = Some(link.clone());
        }
        if let Some(ref template_dictionary) = patch.template_dictionary {
            recipe.template_dictionary = template_dictionary.clone();
        }
        Ok(recipe.clone())
    }

    async fn delete_recipe(&self, id: &str) -> Result<(), TrackingError> {
        let mut state = self.state();
        state.calls.recipe_deletes += 1;
        if state.fail_deletes {
            return Err(server_error("DELETE", format!("recipes/{}", id)));
        }
        let before: usize = state.recipes.len();
        state.recipes.retain(|r| r.id != id);
        if state.recipes.len() == before {
            return Err(TrackingError::not_found("DELETE", format!("recipes/{}", id)));
        }
        Ok(())
    }

    async fn patch_job(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, TrackingError> {
        let mut state = self.state();
        state.calls.job_patches += 1;
        let job: &mut JobRecord = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| TrackingError::not_found("PATCH", format!("jobs/{}", id)))?;
        if let Some(ref status) = patch.status {
            job.status = Some(status.clone());
        }
        if let Some(ref image_id) = patch.resultant_image_id {
            job.resultant_image_id = Some(image_id.clone());
        }
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_artifacts_model::ArtifactLink;

    #[tokio::test]
    async fn test_image_lifecycle() {
        let service = MemoryTrackingService::new();
        let created = service
            .create_image(&NewImage {
                name: "sles15".into(),
                arch: Some("x86_64".into()),
            })
            .await
            .unwrap();
        assert!(!created.is_published());

        let patched = service
            .patch_image(
                &created.id,
                &ImagePatch::link(ArtifactLink::s3("b", "id/manifest.json", "e")),
            )
            .await
            .unwrap();
        assert!(patched.is_published());
        assert_eq!(service.images_named("sles15").await.unwrap().len(), 1);
        assert!(service.images_named("other").await.unwrap().is_empty());

        service.delete_image(&created.id).await.unwrap();
        let err = service.get_image(&created.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(service.calls().image_deletes, 1);
    }

    #[tokio::test]
    async fn test_job_patches() {
        let service = MemoryTrackingService::new();
        service.insert_job("job-1");

        service
            .patch_job("job-1", &JobPatch::status("packaging_artifacts"))
            .await
            .unwrap();
        let job = service
            .patch_job("job-1", &JobPatch::resultant_image("img-1"))
            .await
            .unwrap();

        assert_eq!(job.status.as_deref(), Some("packaging_artifacts"));
        assert_eq!(job.resultant_image_id.as_deref(), Some("img-1"));
        assert!(service
            .patch_job("job-2", &JobPatch::status("error"))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
