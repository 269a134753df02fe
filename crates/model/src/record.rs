//! Tracking-service records and request bodies.
//!
//! Records start as drafts (no `link`) and become published once a link to
//! their content has been patched in.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::manifest::ArtifactLink;

/// Recipe type sent when registering recipes.
pub const RECIPE_TYPE_KIWI_NG: &str = "kiwi-ng";

/// An image record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Identifier assigned by the tracking service.
    pub id: String,
    /// Image name; not unique.
    pub name: String,
    /// Creation timestamp as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Pointer to the image manifest; unset while the record is a draft.
    #[serde(default)]
    pub link: Option<ArtifactLink>,
    /// Target architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl ImageRecord {
    /// Whether a manifest has been attached.
    pub fn is_published(&self) -> bool {
        self.link.is_some()
    }
}

/// Body for creating an image record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewImage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Body for patching an image record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ArtifactLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl ImagePatch {
    /// Patch that attaches a manifest link.
    pub fn link(link: ArtifactLink) -> Self {
        Self {
            link: Some(link),
            arch: None,
        }
    }
}

/// Key/value pairs substituted into a recipe when it is built.
///
/// Stored by the tracking service as a list of `{"key": .., "value": ..}`
/// objects; compared here as a mapping, so entry order never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateDictionary(BTreeMap<String, String>);

#[derive(Serialize, Deserialize)]
struct TemplateEntry {
    key: String,
    value: String,
}

impl TemplateDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for TemplateDictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            seq.serialize_element(&TemplateEntry {
                key: key.clone(),
                value: value.clone(),
            })?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TemplateDictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The service sends null for recipes registered without a dictionary.
        let entries: Option<Vec<TemplateEntry>> = Option::deserialize(deserializer)?;
        Ok(entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect())
    }
}

/// A recipe record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_type: Option<String>,
    /// Linux distribution the recipe builds, e.g. `sles15`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_distribution: Option<String>,
    #[serde(default)]
    pub template_dictionary: TemplateDictionary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_dkms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Pointer to the recipe archive; unset while the record is a draft.
    #[serde(default)]
    pub link: Option<ArtifactLink>,
}

impl RecipeRecord {
    /// Whether an archive has been attached.
    pub fn is_published(&self) -> bool {
        self.link.is_some()
    }
}

/// Body for creating a recipe record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecipe {
    pub name: String,
    pub recipe_type: String,
    pub linux_distribution: String,
    /// Omitted from the body when empty.
    #[serde(skip_serializing_if = "TemplateDictionary::is_empty")]
    pub template_dictionary: TemplateDictionary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_dkms: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Body for patching a recipe record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ArtifactLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dictionary: Option<TemplateDictionary>,
}

/// A job record, as far as this crate cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resultant_image_id: Option<String>,
}

/// Body for patching a job record.
///
/// Only one field is ever set per patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resultant_image_id: Option<String>,
}

impl JobPatch {
    /// Patch that sets the job status.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            resultant_image_id: None,
        }
    }

    /// Patch that records the image a job produced.
    pub fn resultant_image(image_id: impl Into<String>) -> Self {
        Self {
            status: None,
            resultant_image_id: Some(image_id.into()),
        }
    }
}
