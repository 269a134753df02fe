//! Mapping of AWS SDK errors onto `StorageError`.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use ims_artifacts_storage::StorageError;

/// Convert an SDK error for `bucket`/`key` into a classified `StorageError`.
pub(crate) fn from_sdk_error<E>(err: SdkError<E, HttpResponse>, bucket: &str, key: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message: String = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ConstructionFailure(_) => StorageError::InvalidConfig { message },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageError::NetworkError {
                message,
                retryable: true,
            }
        }
        SdkError::ServiceError(ref service) => {
            let status: u16 = service.raw().status().as_u16();
            classify_status(status, message, bucket, key)
        }
        _ => StorageError::NetworkError {
            message,
            retryable: true,
        },
    }
}

/// Classify a store response status.
///
/// Throttling and server errors are retryable; authorization failures and
/// other client errors are not.
pub(crate) fn classify_status(status: u16, message: String, bucket: &str, key: &str) -> StorageError {
    match status {
        401 | 403 => StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        },
        404 => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        408 | 429 | 500..=599 => StorageError::NetworkError {
            message,
            retryable: true,
        },
        _ => StorageError::NetworkError {
            message,
            retryable: false,
        },
    }
}
