//! AWS SDK S3 backend for IMS artifact storage.
//!
//! This crate provides a `StorageClient` implementation using the AWS SDK for
//! Rust. It talks to AWS S3 or to any S3-compatible endpoint (Ceph RGW in
//! most deployments) using path-style addressing.
//!
//! # Example
//!
//! ```ignore
//! use ims_artifacts_storage_crt::CrtStorageClient;
//! use ims_artifacts_storage::{ParallelChunkDownloader, StorageSettings};
//!
//! let settings = StorageSettings::from_env()?;
//! let client = CrtStorageClient::new(&settings).await?;
//!
//! let downloader = ParallelChunkDownloader::new(&client, &settings.bucket);
//! downloader.download("1234/rootfs", Path::new("/tmp/rootfs")).await?;
//! ```

mod client;
mod error;

pub use client::CrtStorageClient;
