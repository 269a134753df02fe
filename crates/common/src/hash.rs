//! Checksum computation utilities.
//!
//! Artifact checksums are MD5 digests of the local file bytes. The same
//! digest is attached to uploaded objects as metadata and later compared
//! against manifests during duplicate detection, so every call site must go
//! through these functions.

use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::constants::CHECKSUM_BLOCK_SIZE;
use crate::error::FileAccessError;

/// Compute the MD5 checksum of a byte slice.
///
/// # Returns
/// 32-character lowercase hex string.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher: Md5Hasher = Md5Hasher::new();
    hasher.update(data);
    hasher.finish_hex()
}

/// Compute the MD5 checksum of a file.
///
/// Reads the file in fixed-size blocks so memory use is constant regardless
/// of file size.
///
/// # Arguments
/// * `path` - Path to the file to checksum
///
/// # Returns
/// 32-character lowercase hex string.
///
/// # Errors
/// Returns `FileAccessError` if the file cannot be opened or read.
pub fn checksum_file(path: &Path) -> Result<String, FileAccessError> {
    let mut file: std::fs::File =
        std::fs::File::open(path).map_err(|e| FileAccessError::from_io(path, e))?;
    let mut hasher: Md5Hasher = Md5Hasher::new();
    let mut buffer: Vec<u8> = vec![0u8; CHECKSUM_BLOCK_SIZE];

    loop {
        let bytes_read: usize = file
            .read(&mut buffer)
            .map_err(|e| FileAccessError::from_io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish_hex())
}

/// Streaming hasher for incremental MD5 computation.
pub struct Md5Hasher {
    inner: Md5,
}

impl Md5Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Update the hasher with additional data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the digest as a 32-char lowercase hex string.
    pub fn finish_hex(self) -> String {
        format!("{:x}", self.inner.finalize())
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}
