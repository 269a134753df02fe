//! Parallel chunked download of single objects.
//!
//! [`ParallelChunkDownloader`] probes an object's size, pre-sizes the local
//! file, and then either fetches the object whole or fans range reads out
//! over a bounded pool. Each range task opens its own file handle and writes
//! at its own offset, so tasks never share a cursor.
//!
//! A failed range fails the whole download. The local file is left in an
//! undefined state and should be discarded by the caller.

use std::io::SeekFrom;
use std::path::Path;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::chunks::{generate_chunks, needs_chunking, ChunkInfo};
use crate::error::StorageError;
use crate::traits::{ObjectMetadata, StorageClient};
use crate::types::DownloadOptions;
use crate::upload::checksum_in_background;

/// Summary of a completed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadResult {
    /// Object size in bytes; the local file has exactly this length.
    pub size: u64,
    /// Number of range requests issued. Zero for a whole-object transfer.
    pub range_requests: usize,
}

impl DownloadResult {
    /// Whether the object was fetched with a single whole-object transfer.
    pub fn is_single_transfer(&self) -> bool {
        self.range_requests == 0
    }
}

/// Downloads objects from one bucket with concurrent range reads.
pub struct ParallelChunkDownloader<'a, C: StorageClient> {
    client: &'a C,
    bucket: String,
    options: DownloadOptions,
}

impl<'a, C: StorageClient> ParallelChunkDownloader<'a, C> {
    /// Create a downloader with default options.
    pub fn new(client: &'a C, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            options: DownloadOptions::default(),
        }
    }

    /// Set download options.
    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Download `key` into `local_path`.
    ///
    /// # Arguments
    /// * `key` - Object key
    /// * `local_path` - Destination file; created or truncated
    ///
    /// # Returns
    /// The object size and how many range requests were made.
    ///
    /// # Errors
    /// `StorageError::NotFound` if the object does not exist, or the first
    /// error any range task reports.
    pub async fn download(
        &self,
        key: &str,
        local_path: &Path,
    ) -> Result<DownloadResult, StorageError> {
        let head: ObjectMetadata = self
            .client
            .head_object(&self.bucket, key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })?;
        let size: u64 = head.size;

        preallocate(local_path, size).await?;

        if !needs_chunking(size, self.options.chunk_size) {
            log::debug!(
                "Downloading s3://{}/{} ({} bytes) as a single transfer",
                self.bucket,
                key,
                size
            );
            self.client
                .get_object_to_file(&self.bucket, key, local_path)
                .await?;
            return Ok(DownloadResult {
                size,
                range_requests: 0,
            });
        }

        let chunks: Vec<ChunkInfo> = generate_chunks(size, self.options.chunk_size);
        let range_requests: usize = chunks.len();
        let max_concurrency: usize = self.options.max_concurrency.max(1);

        log::debug!(
            "Downloading s3://{}/{} ({} bytes) in {} ranges, {} at a time",
            self.bucket,
            key,
            size,
            range_requests,
            max_concurrency
        );

        stream::iter(chunks)
            .map(|chunk| self.download_chunk(key, local_path, chunk))
            .buffer_unordered(max_concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(DownloadResult {
            size,
            range_requests,
        })
    }

    /// Download `key` and check the local file's MD5 against `expected_md5`.
    ///
    /// # Errors
    /// `StorageError::ChecksumMismatch` if the downloaded bytes differ.
    pub async fn download_verified(
        &self,
        key: &str,
        local_path: &Path,
        expected_md5: &str,
    ) -> Result<DownloadResult, StorageError> {
        let result: DownloadResult = self.download(key, local_path).await?;

        let actual: String = checksum_in_background(local_path).await?;

        if !actual.eq_ignore_ascii_case(expected_md5) {
            return Err(StorageError::ChecksumMismatch {
                path: local_path.display().to_string(),
                expected: expected_md5.to_string(),
                actual,
            });
        }
        Ok(result)
    }

    async fn download_chunk(
        &self,
        key: &str,
        local_path: &Path,
        chunk: ChunkInfo,
    ) -> Result<(), StorageError> {
        let data: Vec<u8> = self
            .client
            .get_object_range(&self.bucket, key, chunk.offset, chunk.length)
            .await?;

        if data.len() as u64 != chunk.length {
            return Err(StorageError::SizeMismatch {
                key: format!("{} [{}]", key, chunk.range_header()),
                expected: chunk.length,
                actual: data.len() as u64,
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(local_path)
            .await
            .map_err(|e| StorageError::io(local_path.display().to_string(), e))?;
        file.seek(SeekFrom::Start(chunk.offset))
            .await
            .map_err(|e| StorageError::io(local_path.display().to_string(), e))?;
        file.write_all(&data)
            .await
            .map_err(|e| StorageError::io(local_path.display().to_string(), e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io(local_path.display().to_string(), e))?;

        Ok(())
    }
}

/// Create `path` (and its parent directories) with exactly `size` bytes.
async fn preallocate(path: &Path, size: u64) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }
    }
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io(path.display().to_string(), e))?;
    file.set_len(size)
        .await
        .map_err(|e| StorageError::io(path.display().to_string(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorageClient;
    use ims_artifacts_common::checksum_bytes;
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_small_object_single_transfer() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStorageClient::new();
        client.insert("b", "id/kernel", patterned(1000));

        let downloader = ParallelChunkDownloader::new(&client, "b")
            .with_options(DownloadOptions::new().with_chunk_size(4096));
        let dest = dir.path().join("nested/kernel");
        let result = downloader.download("id/kernel", &dest).await.unwrap();

        assert!(result.is_single_transfer());
        assert_eq!(std::fs::read(&dest).unwrap(), patterned(1000));
        assert!(client.range_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chunked_download_reassembles() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStorageClient::new();
        let data = patterned(10_000);
        client.insert("b", "id/rootfs", data.clone());

        let downloader = ParallelChunkDownloader::new(&client, "b").with_options(
            DownloadOptions::new()
                .with_chunk_size(3000)
                .with_max_concurrency(2),
        );
        let dest = dir.path().join("rootfs");
        let result = downloader.download("id/rootfs", &dest).await.unwrap();

        assert_eq!(result.range_requests, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStorageClient::new();
        let downloader = ParallelChunkDownloader::new(&client, "b");

        let err = downloader
            .download("nope", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_range_failure_fails_download() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStorageClient::new();
        client.insert("b", "id/rootfs", patterned(10_000));
        client.fail_range_at(
            3000,
            StorageError::NetworkError {
                message: "connection reset".into(),
                retryable: true,
            },
        );

        let downloader = ParallelChunkDownloader::new(&client, "b")
            .with_options(DownloadOptions::new().with_chunk_size(3000));
        let err = downloader
            .download("id/rootfs", &dir.path().join("rootfs"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_download_verified() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStorageClient::new();
        let data = patterned(5000);
        client.insert("b", "id/initrd", data.clone());
        let downloader = ParallelChunkDownloader::new(&client, "b")
            .with_options(DownloadOptions::new().with_chunk_size(2048));

        let dest = dir.path().join("initrd");
        downloader
            .download_verified("id/initrd", &dest, &checksum_bytes(&data))
            .await
            .unwrap();

        let err = downloader
            .download_verified("id/initrd", &dest, "00000000000000000000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ChecksumMismatch { .. }));
    }
}
