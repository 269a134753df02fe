//! In-memory [`StorageClient`] for tests and dry runs.
//!
//! Objects live in a map keyed by bucket and key. The client counts calls
//! and can be told to fail specific operations.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ims_artifacts_common::checksum_bytes;

use crate::error::StorageError;
use crate::traits::{ObjectInfo, ObjectMetadata, StorageClient};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    etag: String,
    user_metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    put_count: usize,
    whole_gets: usize,
    range_requests: Vec<(u64, u64)>,
    ranges_in_flight: usize,
    peak_ranges_in_flight: usize,
    delete_calls: usize,
    keys_at_put_failure: Option<Vec<String>>,
    put_failures: VecDeque<StorageError>,
    key_failures: HashMap<String, StorageError>,
    range_failures: HashMap<u64, StorageError>,
    delete_failure: Option<StorageError>,
}

/// Object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    state: Mutex<State>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object directly, bypassing call counting.
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.insert_with_metadata(bucket, key, data, HashMap::new());
    }

    /// Store an object with user metadata, bypassing call counting.
    pub fn insert_with_metadata(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        user_metadata: HashMap<String, String>,
    ) {
        let object: StoredObject = StoredObject {
            etag: quoted_etag(&data),
            data,
            content_type: None,
            user_metadata,
        };
        self.state()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
    }

    /// Contents of an object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// All keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of put calls made, including failed ones.
    pub fn put_count(&self) -> usize {
        self.state().put_count
    }

    /// Number of whole-object get calls made.
    pub fn whole_object_gets(&self) -> usize {
        self.state().whole_gets
    }

    /// `(offset, length)` of every range read, in call order.
    pub fn range_requests(&self) -> Vec<(u64, u64)> {
        self.state().range_requests.clone()
    }

    /// Most range reads that were outstanding at the same time.
    pub fn peak_ranges_in_flight(&self) -> usize {
        self.state().peak_ranges_in_flight
    }

    /// Number of delete calls made.
    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    /// Keys in the bucket at the moment the latest injected put failure fired.
    pub fn keys_at_put_failure(&self) -> Option<Vec<String>> {
        self.state().keys_at_put_failure.clone()
    }

    /// Fail the next `count` put calls with `error`.
    pub fn fail_next_puts(&self, count: usize, error: StorageError) {
        let mut state = self.state();
        for _ in 0..count {
            state.put_failures.push_back(error.clone());
        }
    }

    /// Fail every put to `key` with `error`.
    pub fn fail_puts_to(&self, key: &str, error: StorageError) {
        self.state().key_failures.insert(key.to_string(), error);
    }

    /// Fail range reads starting at `offset` with `error`.
    pub fn fail_range_at(&self, offset: u64, error: StorageError) {
        self.state().range_failures.insert(offset, error);
    }

    /// Fail every delete call with `error`.
    pub fn fail_deletes(&self, error: StorageError) {
        self.state().delete_failure = Some(error);
    }

    fn store(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        state.put_count += 1;
        let failure: Option<StorageError> = match state.key_failures.get(key) {
            Some(error) => Some(error.clone()),
            None => state.put_failures.pop_front(),
        };
        if let Some(error) = failure {
            let snapshot: Vec<String> = state
                .objects
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, k)| k.clone())
                .collect();
            state.keys_at_put_failure = Some(snapshot);
            return Err(error);
        }
        let object: StoredObject = StoredObject {
            etag: quoted_etag(&data),
            data,
            content_type: content_type.map(str::to_string),
            user_metadata: metadata.cloned().unwrap_or_default(),
        };
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
        Ok(())
    }

    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut state = self.state();
        state.whole_gets += 1;
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

fn quoted_etag(data: &[u8]) -> String {
    format!("\"{}\"", checksum_bytes(data))
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, StorageError> {
        Ok(self
            .state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| ObjectMetadata {
                size: o.data.len() as u64,
                last_modified: None,
                content_type: o.content_type.clone(),
                etag: Some(o.etag.clone()),
                user_metadata: o.user_metadata.clone(),
            }))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        self.store(bucket, key, data.to_vec(), content_type, metadata)
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        let data: Vec<u8> = tokio::fs::read(file_path)
            .await
            .map_err(|e| StorageError::io(file_path.display().to_string(), e))?;
        self.store(bucket, key, data, content_type, metadata)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.fetch(bucket, key)
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError> {
        {
            let mut state = self.state();
            state.range_requests.push((offset, length));
            state.ranges_in_flight += 1;
            state.peak_ranges_in_flight = state.peak_ranges_in_flight.max(state.ranges_in_flight);
        }
        // let other range reads start before this one completes
        tokio::task::yield_now().await;

        let mut state = self.state();
        state.ranges_in_flight -= 1;
        if let Some(error) = state.range_failures.get(&offset) {
            return Err(error.clone());
        }
        let object: &StoredObject = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        let len: u64 = object.data.len() as u64;
        let start: usize = offset.min(len) as usize;
        let end: usize = offset.saturating_add(length).min(len) as usize;
        Ok(object.data[start..end].to_vec())
    }

    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
    ) -> Result<(), StorageError> {
        let data: Vec<u8> = self.fetch(bucket, key)?;
        tokio::fs::write(file_path, data)
            .await
            .map_err(|e| StorageError::io(file_path.display().to_string(), e))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        Ok(self
            .state()
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), o)| ObjectInfo {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: None,
                etag: Some(o.etag.clone()),
            })
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        let mut state = self.state();
        state.delete_calls += 1;
        if let Some(ref error) = state.delete_failure {
            return Err(error.clone());
        }
        for key in keys {
            state.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }
}
