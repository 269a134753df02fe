//! AWS SDK S3 client implementation.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use ims_artifacts_storage::{
    ChunkInfo, ObjectInfo, ObjectMetadata, StorageClient, StorageError, StorageSettings,
};

use crate::error::from_sdk_error;

/// Maximum keys per DeleteObjects request.
const DELETE_BATCH_SIZE: usize = 1000;

/// StorageClient implementation using AWS SDK for Rust.
pub struct CrtStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
}

impl CrtStorageClient {
    /// Create a new storage client.
    ///
    /// Uses static credentials from `settings` when present, otherwise the
    /// default credential chain. A custom endpoint switches to path-style
    /// addressing.
    ///
    /// # Arguments
    /// * `settings` - Storage settings including endpoint, region and credentials
    ///
    /// # Returns
    /// A new storage client.
    pub async fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "ims-artifacts",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(ref endpoint_url) = settings.endpoint_url {
            log::debug!("Using object store endpoint {}", endpoint_url);
            s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Self {
            s3_client: S3Client::from_conf(s3_config.build()),
        })
    }

    /// Create a client from an existing S3Client (for testing).
    pub fn from_client(s3_client: S3Client) -> Self {
        Self { s3_client }
    }
}

async fn write_body(mut body: ByteStream, file_path: &Path) -> Result<(), StorageError> {
    let mut file = File::create(file_path)
        .await
        .map_err(|e| StorageError::IoError {
            path: file_path.display().to_string(),
            message: e.to_string(),
        })?;

    while let Some(chunk) = body.try_next().await.map_err(|e| StorageError::NetworkError {
        message: e.to_string(),
        retryable: true,
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|e| StorageError::IoError {
                path: file_path.display().to_string(),
                message: e.to_string(),
            })?;
    }

    file.flush().await.map_err(|e| StorageError::IoError {
        path: file_path.display().to_string(),
        message: e.to_string(),
    })
}

async fn collect_body(body: ByteStream) -> Result<Vec<u8>, StorageError> {
    Ok(body
        .collect()
        .await
        .map_err(|e| StorageError::NetworkError {
            message: e.to_string(),
            retryable: true,
        })?
        .into_bytes()
        .to_vec())
}

#[async_trait]
impl StorageClient for CrtStorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, StorageError> {
        match self.s3_client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => {
                let user_metadata: HashMap<String, String> = output
                    .metadata()
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();

                let last_modified: Option<i64> = output
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                Ok(Some(ObjectMetadata {
                    size: output.content_length().map(|l| l as u64).unwrap_or(0),
                    last_modified,
                    content_type: output.content_type().map(|s| s.to_string()),
                    etag: output.e_tag().map(|s| s.to_string()),
                    user_metadata,
                }))
            }
            Err(err) => match from_sdk_error(err, bucket, key) {
                StorageError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        if let Some(meta) = metadata {
            for (k, v) in meta {
                request = request.metadata(k, v);
            }
        }

        request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;
        Ok(())
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| StorageError::IoError {
                path: file_path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut request = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        if let Some(meta) = metadata {
            for (k, v) in meta {
                request = request.metadata(k, v);
            }
        }

        request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        collect_body(response.body).await
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range: String = ChunkInfo {
            index: 0,
            offset,
            length,
        }
        .range_header();

        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        collect_body(response.body).await
    }

    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
    ) -> Result<(), StorageError> {
        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::IoError {
                    path: parent.display().to_string(),
                    message: e.to_string(),
                })?;
        }

        write_body(response.body, file_path).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects: Vec<ObjectInfo> = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|err| from_sdk_error(err, bucket, prefix))?;

            for obj in response.contents() {
                let last_modified: Option<i64> = obj
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().map(|s| s as u64).unwrap_or(0),
                    last_modified,
                    etag: obj.e_tag().map(|s| s.to_string()),
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let identifiers: Vec<ObjectIdentifier> = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<_, _>>()
                .map_err(|e| StorageError::InvalidConfig {
                    message: e.to_string(),
                })?;

            let delete: Delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::InvalidConfig {
                    message: e.to_string(),
                })?;

            let output = self
                .s3_client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| from_sdk_error(err, bucket, &batch[0]))?;

            if let Some(failed) = output.errors().first() {
                return Err(StorageError::NetworkError {
                    message: format!(
                        "Failed to delete {}: {}",
                        failed.key().unwrap_or_default(),
                        failed.message().unwrap_or_default()
                    ),
                    retryable: true,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crt_client_implements_storage_client() {
        fn assert_storage_client<T: StorageClient>() {}
        assert_storage_client::<CrtStorageClient>();
    }
}
