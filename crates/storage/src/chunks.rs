//! Byte-range planning for parallel downloads.
//!
//! Pure logic, no I/O.

/// One contiguous byte range of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Zero-based chunk index.
    pub index: usize,
    /// Byte offset within the object.
    pub offset: u64,
    /// Length of this chunk in bytes.
    pub length: u64,
}

impl ChunkInfo {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// HTTP `Range` header value (inclusive end).
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end().saturating_sub(1))
    }
}

/// Whether an object of `size` bytes should be fetched as several ranges.
///
/// Objects no larger than `chunk_size` are fetched whole.
/// If `chunk_size` is 0, chunking is disabled.
pub fn needs_chunking(size: u64, chunk_size: u64) -> bool {
    chunk_size > 0 && size > chunk_size
}

/// Split `[0, size)` into contiguous ranges.
///
/// # Arguments
/// * `size` - Total object size in bytes
/// * `chunk_size` - Size of each range
///
/// # Returns
/// Ranges in offset order. The last range may be shorter than `chunk_size`.
/// Returns a single range covering the object when chunking is disabled.
pub fn generate_chunks(size: u64, chunk_size: u64) -> Vec<ChunkInfo> {
    if chunk_size == 0 || size == 0 {
        return vec![ChunkInfo {
            index: 0,
            offset: 0,
            length: size,
        }];
    }

    let mut chunks: Vec<ChunkInfo> = Vec::with_capacity(expected_chunk_count(size, chunk_size));
    let mut offset: u64 = 0;
    let mut index: usize = 0;

    while offset < size {
        let length: u64 = std::cmp::min(chunk_size, size - offset);
        chunks.push(ChunkInfo {
            index,
            offset,
            length,
        });
        offset += length;
        index += 1;
    }

    chunks
}

/// Number of ranges [`generate_chunks`] produces.
pub fn expected_chunk_count(size: u64, chunk_size: u64) -> usize {
    if chunk_size == 0 || size == 0 {
        return 1;
    }
    size.div_ceil(chunk_size) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_needs_chunking() {
        assert!(!needs_chunking(5 * MB, 10 * MB));
        assert!(!needs_chunking(10 * MB, 10 * MB));
        assert!(needs_chunking(10 * MB + 1, 10 * MB));
        assert!(!needs_chunking(1_000_000_000, 0));
    }

    #[test]
    fn test_generate_chunks_with_remainder() {
        let chunks = generate_chunks(25 * MB, 10 * MB);
        assert_eq!(
            chunks,
            vec![
                ChunkInfo { index: 0, offset: 0, length: 10 * MB },
                ChunkInfo { index: 1, offset: 10 * MB, length: 10 * MB },
                ChunkInfo { index: 2, offset: 20 * MB, length: 5 * MB },
            ]
        );
        assert_eq!(chunks[2].end(), 25 * MB);
    }

    #[test]
    fn test_generate_chunks_exact_multiple() {
        let chunks = generate_chunks(300, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], ChunkInfo { index: 2, offset: 200, length: 100 });
    }

    #[test]
    fn test_generate_chunks_empty_object() {
        let chunks = generate_chunks(0, 100);
        assert_eq!(chunks, vec![ChunkInfo { index: 0, offset: 0, length: 0 }]);
    }

    #[test]
    fn test_expected_chunk_count() {
        assert_eq!(expected_chunk_count(100, 10 * MB), 1);
        assert_eq!(expected_chunk_count(10 * MB, 10 * MB), 1);
        assert_eq!(expected_chunk_count(10 * MB + 1, 10 * MB), 2);
        assert_eq!(expected_chunk_count(25 * MB, 10 * MB), 3);
    }

    #[test]
    fn test_range_header_is_inclusive() {
        let chunk = ChunkInfo { index: 1, offset: 100, length: 50 };
        assert_eq!(chunk.range_header(), "bytes=100-149");
    }
}
