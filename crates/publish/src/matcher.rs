//! Duplicate detection against already-published records.
//!
//! A failed fetch or parse is never an error here: a record whose manifest
//! cannot be read simply does not match.

use std::collections::BTreeMap;

use ims_artifacts_common::FileAccessError;
use ims_artifacts_model::{
    ArtifactKind, ArtifactSpec, ImageRecord, Manifest, RecipeRecord, TemplateDictionary,
};
use ims_artifacts_storage::{
    checksum_in_background, ObjectMetadata, StorageClient, METADATA_CHECKSUM,
};

/// Checksums of local artifacts, keyed by kind.
pub type ChecksumSet = BTreeMap<ArtifactKind, String>;

/// Checksum every artifact on the blocking pool.
///
/// # Errors
/// The first artifact that cannot be read.
pub async fn local_checksums(artifacts: &[ArtifactSpec]) -> Result<ChecksumSet, FileAccessError> {
    let mut checksums: ChecksumSet = ChecksumSet::new();
    for artifact in artifacts {
        let checksum: String = checksum_in_background(&artifact.local_path).await?;
        checksums.insert(artifact.kind, checksum);
    }
    Ok(checksums)
}

/// Compares proposed artifacts with what published records already hold.
pub struct DuplicateMatcher<'a, C: StorageClient> {
    client: &'a C,
}

impl<'a, C: StorageClient> DuplicateMatcher<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Download and parse the manifest an image record links to.
    ///
    /// Returns None if the record has no link, the link is not an object-store
    /// path, or the manifest cannot be fetched or parsed.
    pub async fn fetch_manifest(&self, record: &ImageRecord) -> Option<Manifest> {
        let link = record.link.as_ref()?;
        let Some((bucket, key)) = link.bucket_and_key() else {
            log::debug!("Record {} links to unsupported path {}", record.id, link.path);
            return None;
        };

        let bytes: Vec<u8> = match self.client.get_object(bucket, key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Could not fetch manifest for record {}: {}", record.id, e);
                return None;
            }
        };

        let content: String = String::from_utf8_lossy(&bytes).into_owned();
        match Manifest::decode(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                log::debug!("Could not parse manifest for record {}: {}", record.id, e);
                None
            }
        }
    }

    /// Whether `record` already holds exactly `artifacts` under `name`.
    ///
    /// Every provided kind must appear in the record's manifest with an
    /// identical checksum. Manifest entries for kinds not provided are
    /// ignored. An unreadable local artifact means no match.
    pub async fn matches(&self, record: &ImageRecord, name: &str, artifacts: &[ArtifactSpec]) -> bool {
        match local_checksums(artifacts).await {
            Ok(checksums) => self.matching_manifest(record, name, &checksums).await.is_some(),
            Err(e) => {
                log::debug!("Cannot compare local artifacts: {}", e);
                false
            }
        }
    }

    /// The record's manifest, if it matches `name` and `checksums`.
    pub async fn matching_manifest(
        &self,
        record: &ImageRecord,
        name: &str,
        checksums: &ChecksumSet,
    ) -> Option<Manifest> {
        if record.name != name {
            return None;
        }
        let manifest: Manifest = self.fetch_manifest(record).await?;
        let published: ChecksumSet = checksums
            .keys()
            .filter_map(|kind| {
                manifest
                    .checksum_for(*kind)
                    .map(|checksum| (*kind, checksum.to_string()))
            })
            .collect();
        if published == *checksums {
            Some(manifest)
        } else {
            None
        }
    }

    /// Checksum of the archive a recipe record links to.
    ///
    /// Read from the object's checksum metadata; no body is transferred.
    pub async fn fetch_recipe_checksum(&self, record: &RecipeRecord) -> Option<String> {
        let link = record.link.as_ref()?;
        let (bucket, key) = link.bucket_and_key()?;
        let head: ObjectMetadata = match self.client.head_object(bucket, key).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                log::debug!("Recipe {} archive {} is missing", record.id, link.path);
                return None;
            }
            Err(e) => {
                log::debug!("Could not inspect recipe {} archive: {}", record.id, e);
                return None;
            }
        };
        head.user_metadata.get(METADATA_CHECKSUM).cloned()
    }

    /// Whether `record` is `name` with archive `checksum` and `template`.
    pub async fn recipe_matches(
        &self,
        record: &RecipeRecord,
        name: &str,
        checksum: &str,
        template: &TemplateDictionary,
    ) -> bool {
        if record.name != name || record.template_dictionary != *template {
            return false;
        }
        self.fetch_recipe_checksum(record).await.as_deref() == Some(checksum)
    }
}
