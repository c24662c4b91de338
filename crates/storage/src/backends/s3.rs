//! S3-compatible storage backend using the AWS SDK.
//!
//! Links are SigV4 presigned URLs minted with the service's credentials.
//! Upload links carry the uploader identity as `x-amz-meta-user-id`, which
//! the signature covers and S3 persists as object metadata.

use crate::error::{StorageError, StorageResult};
use crate::traits::{AccessMethod, ByteStream, ObjectMeta, ObjectStore, SignedUrl};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// S3-compatible object store.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`)
    ///   instead of virtual-hosted style. Required for MinIO and some
    ///   S3-compatible services; AWS S3 requires virtual-hosted style (false).
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let region = aws_config::Region::new(region.unwrap_or_else(|| "us-east-1".to_string()));
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if let (Some(access_key_id), Some(secret_access_key)) =
            (access_key_id, secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "parcel-config",
            ));
        }

        let shared_config = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(force_path_style);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            prefix: prefix.map(|p| p.trim_matches('/').to_string()),
        })
    }

    /// Apply the configured key prefix.
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::S3(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if matches!(err.as_service_error(), Some(e) if e.is_not_found()) {
                    Ok(false)
                } else {
                    Err(Self::sdk_error(err))
                }
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if matches!(err.as_service_error(), Some(e) if e.is_not_found()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    Self::sdk_error(err)
                }
            })?;

        Ok(ObjectMeta {
            size: output.content_length().unwrap_or(0).unsigned_abs(),
            last_modified: output
                .last_modified()
                .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.secs()).ok()),
            content_type: output.content_type().map(str::to_string),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if matches!(err.as_service_error(), Some(e) if e.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    Self::sdk_error(err)
                }
            })?;

        let reader = output.body.into_async_read();
        let stream = ReaderStream::new(reader).map(|chunk| chunk.map_err(StorageError::Io));
        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(Self::sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(Self::sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presign(
        &self,
        key: &str,
        method: AccessMethod,
        ttl: Duration,
        user_id: &str,
    ) -> StorageResult<SignedUrl> {
        let expires_at = OffsetDateTime::now_utc() + ttl;
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Signing(format!("invalid presign ttl: {e}")))?;

        let uri = match method {
            AccessMethod::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(self.full_key(key))
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::Signing(e.to_string()))?
                .uri()
                .to_string(),
            AccessMethod::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(self.full_key(key))
                .metadata("user-id", user_id)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::Signing(e.to_string()))?
                .uri()
                .to_string(),
        };

        Ok(SignedUrl {
            url: uri,
            expires_at,
        })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(Self::sdk_error)?;
        Ok(())
    }
}
