//! Storage traits/interfaces for object-store operations.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

/// Information about an object from list operations.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// ETag as returned by the store (may be quoted).
    pub etag: Option<String>,
}

/// Object metadata from a HEAD request; no body is transferred.
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
    /// Content type.
    pub content_type: Option<String>,
    /// ETag as returned by the store (may be quoted).
    pub etag: Option<String>,
    /// User metadata attached at upload time.
    pub user_metadata: HashMap<String, String>,
}

impl ObjectMetadata {
    /// ETag with surrounding quotes removed.
    pub fn etag_unquoted(&self) -> Option<String> {
        self.etag.as_deref().map(|e| e.replace('"', ""))
    }
}

/// Low-level object-store operations - implemented by each backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetch object metadata. Returns None if the object doesn't exist.
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, StorageError>;

    /// Upload bytes.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError>;

    /// Upload from a local file (streams large files).
    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError>;

    /// Download a whole object to bytes.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Download `length` bytes starting at `offset`.
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError>;

    /// Download a whole object to a local file, replacing its contents.
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
    ) -> Result<(), StorageError>;

    /// List objects with prefix.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Delete the given keys. Missing keys are not an error.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError>;

    /// Delete every object under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize, StorageError> {
        let keys: Vec<String> = self
            .list_objects(bucket, prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete_objects(bucket, &keys).await?;
        Ok(keys.len())
    }
}
