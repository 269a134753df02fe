//! Error types for tracking-service calls.

use thiserror::Error;

/// Errors returned by a [`crate::TrackingService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The request never produced a response.
    #[error("{method} {url} failed: {message}")]
    Http {
        method: String,
        url: String,
        message: String,
        /// The connection could not be established; the server saw nothing.
        connect: bool,
    },

    /// The service answered with a non-2xx status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The client could not be built.
    #[error("Invalid tracking client configuration: {message}")]
    InvalidConfig { message: String },
}

impl TrackingError {
    /// HTTP status, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TrackingError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the service reported that the record does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub(crate) fn not_found(method: &str, url: impl Into<String>) -> Self {
        TrackingError::Status {
            method: method.to_string(),
            url: url.into(),
            status: 404,
            body: "Not Found".to_string(),
        }
    }
}
