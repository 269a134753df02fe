//! Record-tracking service access for IMS artifact publication.
//!
//! [`TrackingService`] is the narrow interface publishers use to create,
//! list, patch and delete image and recipe records and to patch build jobs.
//! [`ImsClient`] implements it over the IMS REST API with `reqwest`;
//! [`MemoryTrackingService`] keeps records in memory.

mod client;
mod error;
mod memory;
mod service;
mod settings;

pub use client::ImsClient;
pub use error::TrackingError;
pub use memory::{CallCounts, MemoryTrackingService};
pub use service::TrackingService;
pub use settings::{HttpRetryPolicy, TrackingSettings, DEFAULT_RETRY_STATUSES};
