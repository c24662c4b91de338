//! Object storage abstraction and backends for Parcel.
//!
//! This crate provides:
//! - The object store contract: head/get/put plus the presigning primitive
//!   that mints signed, time-limited, identity-bound URLs
//! - Backends: local filesystem (HMAC-signed local links) and S3-compatible
//!   (SigV4 presigned URLs)

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{AccessMethod, ByteStream, ObjectMeta, ObjectStore, SignedUrl};

use parcel_core::config::StorageConfig;
use parcel_signer::LinkSigner;
use std::sync::Arc;

/// Create an object store from configuration.
///
/// The signer and public base URL are only used by the filesystem backend,
/// which fulfils its own signed links via the server's `/object` endpoint.
pub async fn from_config(
    config: &StorageConfig,
    signer: Arc<LinkSigner>,
    public_base_url: &str,
) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path, signer, public_base_url).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}
