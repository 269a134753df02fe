//! Shared configuration structures for storage operations.

use std::time::Duration;

use ims_artifacts_common::{DEFAULT_DOWNLOAD_CHUNK_SIZE, DEFAULT_DOWNLOAD_CONCURRENCY};

use crate::error::StorageError;

/// Default number of upload attempts before giving up.
pub const DEFAULT_UPLOAD_MAX_ATTEMPTS: u32 = 20;

/// Default backoff increment between upload attempts.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Default ceiling on the backoff between upload attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Configuration settings for storage operations.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Endpoint of an S3-compatible store; None uses AWS.
    pub endpoint_url: Option<String>,
    /// Region name. S3-compatible stores generally ignore it.
    pub region: String,
    /// Bucket that holds artifacts.
    pub bucket: String,
    /// Static credentials; None uses the default credential chain.
    pub credentials: Option<AwsCredentials>,
    /// Upload retry settings.
    pub upload_retry: RetrySettings,
    /// Parallel download settings.
    pub download: DownloadOptions,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "us-east-1".into(),
            bucket: "boot-images".into(),
            credentials: None,
            upload_retry: RetrySettings::default(),
            download: DownloadOptions::default(),
        }
    }
}

impl StorageSettings {
    /// Create settings for `bucket` with defaults for everything else.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Build settings from the environment the image build pipeline provides.
    ///
    /// Reads `S3_ENDPOINT` (falling back to `S3_HOST`), `S3_ACCESS_KEY`,
    /// `S3_SECRET_KEY`, `S3_BUCKET` and `S3_REGION`. `S3_BUCKET` is required.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let bucket: String = lookup("S3_BUCKET").ok_or_else(|| StorageError::InvalidConfig {
            message: "S3_BUCKET is not set".to_string(),
        })?;

        let mut settings: StorageSettings = StorageSettings::new(bucket);
        settings.endpoint_url = lookup("S3_ENDPOINT").or_else(|| lookup("S3_HOST"));
        if let Some(region) = lookup("S3_REGION") {
            settings.region = region;
        }
        settings.credentials = match (lookup("S3_ACCESS_KEY"), lookup("S3_SECRET_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: None,
            }),
            (None, None) => None,
            _ => {
                return Err(StorageError::InvalidConfig {
                    message: "S3_ACCESS_KEY and S3_SECRET_KEY must be set together".to_string(),
                })
            }
        };
        Ok(settings)
    }

    /// Set the store endpoint.
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set static credentials.
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set upload retry settings.
    pub fn with_upload_retry(mut self, retry: RetrySettings) -> Self {
        self.upload_retry = retry;
        self
    }

    /// Set parallel download settings.
    pub fn with_download_options(mut self, download: DownloadOptions) -> Self {
        self.download = download;
        self
    }
}

/// Static store credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Retry settings for uploads.
///
/// The sleep before retry `n` is `n * backoff_step`, capped at `max_backoff`.
/// `max_attempts: None` retries transient failures forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first; None is unbounded.
    pub max_attempts: Option<u32>,
    /// Backoff increment per attempt.
    pub backoff_step: Duration,
    /// Ceiling on a single backoff sleep.
    pub max_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_UPLOAD_MAX_ATTEMPTS),
            backoff_step: DEFAULT_BACKOFF_STEP,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetrySettings {
    /// Retry transient failures without limit.
    ///
    /// An upload under this policy only returns once it succeeds or hits a
    /// fatal error; a store that stays down blocks the caller indefinitely.
    pub fn forever() -> Self {
        Self {
            max_attempts: None,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Set the backoff increment and ceiling.
    pub fn with_backoff(mut self, step: Duration, max: Duration) -> Self {
        self.backoff_step = step;
        self.max_backoff = max;
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    /// Sleep before the attempt following attempt number `attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step
            .saturating_mul(attempt)
            .min(self.max_backoff)
    }
}

/// Options for parallel chunked downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Size of each range request; objects no larger than this are fetched whole.
    pub chunk_size: u64,
    /// Maximum concurrent range requests.
    pub max_concurrency: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
            max_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

impl DownloadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the range request size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set maximum concurrency for range requests.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_backoff_grows_then_plateaus() {
        let retry = RetrySettings::default();
        assert_eq!(retry.backoff_for(1), Duration::from_secs(1));
        assert_eq!(retry.backoff_for(4), Duration::from_secs(4));
        assert_eq!(retry.backoff_for(10), Duration::from_secs(10));
        assert_eq!(retry.backoff_for(500), Duration::from_secs(10));
    }

    #[test]
    fn test_max_attempts() {
        let retry = RetrySettings::default().with_max_attempts(3);
        assert!(retry.allows_retry_after(1));
        assert!(retry.allows_retry_after(2));
        assert!(!retry.allows_retry_after(3));

        let forever = RetrySettings::forever();
        assert!(forever.allows_retry_after(u32::MAX - 1));
    }

    #[test]
    fn test_with_max_attempts_floor() {
        let retry = RetrySettings::default().with_max_attempts(0);
        assert_eq!(retry.max_attempts, Some(1));
        assert!(!retry.allows_retry_after(1));
    }

    #[test]
    fn test_download_options_default() {
        let options = DownloadOptions::default();
        assert_eq!(options.chunk_size, 20 * 1024 * 1024);
        assert_eq!(options.max_concurrency, 10);
    }

    #[test]
    fn test_settings_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("S3_BUCKET", "boot-images"),
            ("S3_HOST", "http://rgw.local:8080"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
        ]
        .into_iter()
        .collect();
        let settings =
            StorageSettings::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.bucket, "boot-images");
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://rgw.local:8080"));
        assert_eq!(settings.credentials.unwrap().access_key_id, "ak");
    }

    #[test]
    fn test_settings_from_lookup_requires_bucket() {
        let result = StorageSettings::from_lookup(|_| None);
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }

    #[test]
    fn test_settings_from_lookup_partial_credentials() {
        let result = StorageSettings::from_lookup(|name| match name {
            "S3_BUCKET" => Some("b".to_string()),
            "S3_ACCESS_KEY" => Some("ak".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }
}
