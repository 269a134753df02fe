//! Name lookups over tracking-service records.

use ims_artifacts_model::{ImageRecord, RecipeRecord};

use crate::error::PublishError;

/// Common view of image and recipe records.
pub trait Record {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn is_published(&self) -> bool;
}

impl Record for ImageRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_published(&self) -> bool {
        ImageRecord::is_published(self)
    }
}

impl Record for RecipeRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_published(&self) -> bool {
        RecipeRecord::is_published(self)
    }
}

/// Result of looking up published records by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup<R> {
    /// No published record has the name.
    NotFound,
    /// Exactly one published record has the name.
    Found(R),
    /// Several published records share the name, in listing order.
    AmbiguousCandidates(Vec<R>),
}

impl<R: Record> RecordLookup<R> {
    /// Classify the published records among `records`.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut published: Vec<R> = records.into_iter().filter(|r| r.is_published()).collect();
        match published.len() {
            0 => RecordLookup::NotFound,
            1 => match published.pop() {
                Some(record) => RecordLookup::Found(record),
                None => RecordLookup::NotFound,
            },
            _ => RecordLookup::AmbiguousCandidates(published),
        }
    }

    /// All candidates, in listing order.
    pub fn into_candidates(self) -> Vec<R> {
        match self {
            RecordLookup::NotFound => Vec::new(),
            RecordLookup::Found(record) => vec![record],
            RecordLookup::AmbiguousCandidates(records) => records,
        }
    }

    /// The single record, if any.
    ///
    /// # Errors
    /// `PublishError::DuplicateCandidates` if the name is ambiguous.
    pub fn into_single(self, name: &str) -> Result<Option<R>, PublishError> {
        match self {
            RecordLookup::NotFound => Ok(None),
            RecordLookup::Found(record) => Ok(Some(record)),
            RecordLookup::AmbiguousCandidates(records) => Err(PublishError::DuplicateCandidates {
                name: name.to_string(),
                ids: records.iter().map(|r| r.id().to_string()).collect(),
            }),
        }
    }
}

/// Records split by lifecycle state, each in listing order.
#[derive(Debug, Clone)]
pub(crate) struct Candidates<R> {
    pub published: RecordLookup<R>,
    pub drafts: Vec<R>,
}

impl<R: Record> Candidates<R> {
    pub(crate) fn partition(records: Vec<R>) -> Self {
        let (published, drafts): (Vec<R>, Vec<R>) =
            records.into_iter().partition(|r| r.is_published());
        Self {
            published: RecordLookup::from_records(published),
            drafts,
        }
    }
}
