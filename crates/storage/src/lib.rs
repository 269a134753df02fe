//! Object-store access for IMS artifact publication.
//!
//! This crate provides a backend-agnostic [`StorageClient`] interface and the
//! two transfer operations built on it:
//!
//! - **ObjectUploader** - uploads one artifact with checksum metadata, retrying
//!   transient store failures per [`RetrySettings`]
//! - **ParallelChunkDownloader** - fetches one object into a local file using
//!   concurrent range reads
//!
//! Backends live in their own crates (`ims-artifacts-storage-crt` for the AWS
//! SDK). [`MemoryStorageClient`] keeps everything in memory.

mod chunks;
mod download;
mod error;
mod memory;
mod traits;
mod types;
mod upload;

pub use chunks::{expected_chunk_count, generate_chunks, needs_chunking, ChunkInfo};
pub use download::{DownloadResult, ParallelChunkDownloader};
pub use error::{StorageError, UploadError};
pub use memory::MemoryStorageClient;
pub use traits::{ObjectInfo, ObjectMetadata, StorageClient};
pub use types::{
    AwsCredentials, DownloadOptions, RetrySettings, StorageSettings, DEFAULT_BACKOFF_STEP,
    DEFAULT_MAX_BACKOFF, DEFAULT_UPLOAD_MAX_ATTEMPTS,
};
pub use upload::{
    checksum_in_background, ObjectUploader, UploadTags, METADATA_CHECKSUM, METADATA_JOB_ID, METADATA_RECORD_ID,
    METADATA_RECORD_NAME,
};
