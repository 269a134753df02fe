//! Shared constants used across ims-artifacts crates.

/// Block size used when streaming a file through the checksum hasher.
pub const CHECKSUM_BLOCK_SIZE: usize = 64 * 1024;

/// Default chunk size for parallel range downloads (20MB).
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Default number of concurrent range requests per download.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 10;

/// Default base URL of the image management service.
pub const DEFAULT_IMS_API_URL: &str = "https://api-gw-service-nmn.local/apis/ims";
