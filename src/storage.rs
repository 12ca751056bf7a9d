// storage.rs - Object storage for source videos and rendered outputs
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bucket-style storage addressed by flat keys.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<(), StorageError>;

    /// Copy the object at `key` into the file at `local`.
    async fn download(&self, key: &str, local: &Path) -> Result<(), StorageError>;

    /// Time-limited GET link for `key`.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}

/// Keys are generated by the service; anything that could address another
/// prefix is rejected before it reaches the bucket.
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 255
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn content_type_for_key(key: &str) -> &'static str {
    match crate::utils::get_file_extension(key).as_deref() {
        Some("mp4") => "video/mp4",
        Some("gif") => "image/gif",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &Config) -> Self {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.aws_region.clone()));
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let client = match &config.s3_endpoint_url {
            Some(endpoint) => {
                // S3-compatible providers (MinIO etc.) need path-style addressing
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&sdk_config),
        };

        tracing::info!(
            bucket = %config.s3_bucket,
            region = %config.aws_region,
            endpoint = ?config.s3_endpoint_url,
            "S3 storage configured"
        );

        Self {
            client,
            bucket: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> Result<(), StorageError> {
        let start = Instant::now();
        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 upload failed");
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        let start = Instant::now();
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) => {
                    StorageError::NotFound(key.to_string())
                }
                _ => {
                    tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 download failed");
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(local).await?;
        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 download successful"
        );
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}
