//! Shared types and utilities for ims-artifacts.
//!
//! This crate provides common functionality used across all ims-artifacts crates:
//! - Streaming MD5 checksums of local artifact files
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod hash;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::FileAccessError;
pub use hash::{checksum_bytes, checksum_file, Md5Hasher};
