//! Idempotent publication of IMS image artifacts and recipes.
//!
//! Artifacts are uploaded to the object store under the record's prefix,
//! described by a manifest, and linked to a tracking-service record. A
//! publish that fails part way removes the record and everything stored
//! under its prefix.

pub mod error;
pub mod image;
pub mod lookup;
pub mod matcher;
pub mod recipe;
pub mod rollback;

pub use error::PublishError;
pub use image::{ArtifactPublisher, PublishOptions, PublishOutcome, Resolution};
pub use lookup::{Record, RecordLookup};
pub use matcher::{local_checksums, ChecksumSet, DuplicateMatcher};
pub use recipe::{RecipePublisher, RecipeSpec};
pub use rollback::{RollbackCoordinator, RollbackReport};
