//! Tracking client configuration.

use std::time::Duration;

use ims_artifacts_common::DEFAULT_IMS_API_URL;
use reqwest::Method;

use crate::error::TrackingError;

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 3] = [502, 503, 504];

/// Transport-level retry policy for the HTTP tracking client.
///
/// Connection failures are retried for every method. Other transport
/// failures and the listed statuses are retried only for methods that are
/// safe to repeat (`GET`, `HEAD`, `PUT`, `DELETE`, `OPTIONS`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles with each retry.
    pub base_delay: Duration,
    /// Ceiling on a single delay.
    pub max_delay: Duration,
    /// Response statuses that are retried.
    pub statuses: Vec<u16>,
}

impl Default for HttpRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl HttpRetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first delay and the delay ceiling.
    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor: u32 = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether `error` from a `method` request may be retried.
    pub fn is_retryable(&self, method: &Method, error: &TrackingError) -> bool {
        match error {
            TrackingError::Http { connect: true, .. } => true,
            TrackingError::Http { .. } => is_idempotent(method),
            TrackingError::Status { status, .. } => {
                is_idempotent(method) && self.statuses.contains(status)
            }
            TrackingError::Decode { .. } | TrackingError::InvalidConfig { .. } => false,
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

/// Configuration for [`crate::ImsClient`].
#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Service root, e.g. `https://api-gw-service-nmn.local/apis/ims`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Bearer token obtained by the caller, if the gateway requires one.
    pub bearer_token: Option<String>,
    /// Transport retry policy.
    pub retry: HttpRetryPolicy,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IMS_API_URL.to_string(),
            timeout: Duration::from_secs(60),
            user_agent: format!("ims-artifacts/{}", env!("CARGO_PKG_VERSION")),
            bearer_token: None,
            retry: HttpRetryPolicy::default(),
        }
    }
}

impl TrackingSettings {
    /// Create settings for `base_url` with defaults for everything else.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Settings with `base_url` taken from `IMS_URL` when set.
    pub fn from_env() -> Self {
        match std::env::var("IMS_URL") {
            Ok(url) if !url.is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: HttpRetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TrackingError {
        TrackingError::Status {
            method: "GET".into(),
            url: "u".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = HttpRetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(120));
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = HttpRetryPolicy::default();
        assert!(policy.is_retryable(&Method::GET, &status(503)));
        assert!(policy.is_retryable(&Method::DELETE, &status(502)));
        assert!(!policy.is_retryable(&Method::GET, &status(500)));
        assert!(!policy.is_retryable(&Method::GET, &status(404)));
    }

    #[test]
    fn test_non_idempotent_methods_only_retry_connect_failures() {
        let policy = HttpRetryPolicy::default();
        assert!(!policy.is_retryable(&Method::POST, &status(503)));
        assert!(!policy.is_retryable(&Method::PATCH, &status(504)));

        let refused = TrackingError::Http {
            method: "POST".into(),
            url: "u".into(),
            message: "connection refused".into(),
            connect: true,
        };
        assert!(policy.is_retryable(&Method::POST, &refused));

        let reset = TrackingError::Http {
            method: "POST".into(),
            url: "u".into(),
            message: "connection reset".into(),
            connect: false,
        };
        assert!(!policy.is_retryable(&Method::POST, &reset));
        assert!(policy.is_retryable(&Method::GET, &reset));
    }
}
