//! Chunk-boundary behaviour of the parallel downloader at a 10 MiB chunk size.

use tempfile::TempDir;

use ims_artifacts_storage::{
    DownloadOptions, MemoryStorageClient, ParallelChunkDownloader, StorageError,
};

const MB: u64 = 1024 * 1024;
const CHUNK: u64 = 10 * MB;
const BUCKET: &str = "boot-images";

fn patterned(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn downloader(client: &MemoryStorageClient) -> ParallelChunkDownloader<'_, MemoryStorageClient> {
    ParallelChunkDownloader::new(client, BUCKET).with_options(
        DownloadOptions::default()
            .with_chunk_size(CHUNK)
            .with_max_concurrency(10),
    )
}

#[tokio::test]
async fn five_megabytes_is_one_transfer() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    let data = patterned(5 * MB);
    client.insert(BUCKET, "img/rootfs", data.clone());
    let target = dir.path().join("rootfs");

    let result = downloader(&client).download("img/rootfs", &target).await.unwrap();

    assert!(result.is_single_transfer());
    assert_eq!(client.whole_object_gets(), 1);
    assert!(client.range_requests().is_empty());
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 5 * MB);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn exactly_one_chunk_is_one_transfer() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    client.insert(BUCKET, "img/rootfs", patterned(CHUNK));
    let target = dir.path().join("rootfs");

    let result = downloader(&client).download("img/rootfs", &target).await.unwrap();

    assert!(result.is_single_transfer());
    assert_eq!(result.size, CHUNK);
    assert_eq!(client.whole_object_gets(), 1);
    assert!(client.range_requests().is_empty());
}

#[tokio::test]
async fn twenty_five_megabytes_is_three_ranges() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    let data = patterned(25 * MB);
    client.insert(BUCKET, "img/rootfs", data.clone());
    let target = dir.path().join("nested").join("rootfs");

    let result = downloader(&client).download("img/rootfs", &target).await.unwrap();

    assert_eq!(result.range_requests, 3);
    assert_eq!(client.whole_object_gets(), 0);
    let mut ranges = client.range_requests();
    ranges.sort();
    assert_eq!(ranges, vec![(0, CHUNK), (CHUNK, CHUNK), (2 * CHUNK, 5 * MB)]);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn failed_range_fails_download() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    client.insert(BUCKET, "img/rootfs", patterned(25 * MB));
    client.fail_range_at(
        CHUNK,
        StorageError::NetworkError {
            message: "connection reset".into(),
            retryable: true,
        },
    );

    let err = downloader(&client)
        .download("img/rootfs", &dir.path().join("rootfs"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NetworkError { .. }));
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();

    let err = downloader(&client)
        .download("img/absent", &dir.path().join("absent"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
    assert!(!dir.path().join("absent").exists());
}

#[tokio::test]
async fn verified_download_checks_md5() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    let data = patterned(12 * MB);
    client.insert(BUCKET, "img/kernel", data.clone());
    let expected = ims_artifacts_common::checksum_bytes(&data);
    let target = dir.path().join("kernel");

    downloader(&client)
        .download_verified("img/kernel", &target, &expected)
        .await
        .unwrap();

    let err = downloader(&client)
        .download_verified("img/kernel", &target, "0123456789abcdef0123456789abcdef")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ChecksumMismatch { .. }));
}

#[tokio::test]
async fn concurrent_ranges_never_exceed_max_concurrency() {
    let dir = TempDir::new().unwrap();
    let client = MemoryStorageClient::new();
    let data = patterned(60 * MB);
    client.insert(BUCKET, "img/rootfs", data.clone());
    let target = dir.path().join("rootfs");

    let result = ParallelChunkDownloader::new(&client, BUCKET)
        .with_options(
            DownloadOptions::default()
                .with_chunk_size(CHUNK)
                .with_max_concurrency(2),
        )
        .download("img/rootfs", &target)
        .await
        .unwrap();

    assert_eq!(result.range_requests, 6);
    let peak = client.peak_ranges_in_flight();
    assert!((1..=2).contains(&peak), "peak in-flight ranges was {peak}");
    assert_eq!(std::fs::read(&target).unwrap(), data);
}
