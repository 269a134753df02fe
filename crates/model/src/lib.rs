//! Data model for IMS artifact publication.
//!
//! - **Artifacts** - the kinds of files an image build produces, their MIME
//!   types and object-store key layout
//! - **Manifest** - the `manifest.json` document listing every artifact
//!   published for one image record (version "1.0")
//! - **Records** - image, recipe and job records as exchanged with the
//!   tracking service

mod artifact;
mod error;
mod manifest;
mod record;

pub use artifact::{ArtifactKind, ArtifactSpec, IMAGE_ARTIFACT_ORDER};
pub use error::ManifestError;
pub use manifest::{ArtifactLink, LinkType, Manifest, UploadResult, MANIFEST_VERSION};
pub use record::{
    ImagePatch, ImageRecord, JobPatch, JobRecord, NewImage, NewRecipe, RecipePatch, RecipeRecord,
    TemplateDictionary, RECIPE_TYPE_KIWI_NG,
};
