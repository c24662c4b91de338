//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use time::OffsetDateTime;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// HTTP method a signed link is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMethod {
    /// Read access (download).
    Get,
    /// Write access (upload).
    Put,
}

impl AccessMethod {
    /// Parse from the HTTP method name.
    pub fn parse(s: &str) -> StorageResult<Self> {
        match s {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            _ => Err(StorageError::InvalidKey(format!(
                "unsupported link method: {s}"
            ))),
        }
    }

    /// Get the HTTP method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl std::fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<OffsetDateTime>,
    /// Content type (if available).
    pub content_type: Option<String>,
}

/// A signed, time-limited URL for one object and one method.
#[derive(Clone, Debug)]
pub struct SignedUrl {
    /// The full URL.
    pub url: String,
    /// When the URL stops working.
    pub expires_at: OffsetDateTime,
}

/// Object store abstraction.
///
/// `presign` is the store's signing primitive: the returned URL is
/// cryptographically bound to the key, the method, the expiry, and the
/// consuming identity (carried as request metadata covered by the
/// signature), keyed by the service's credentials.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Mint a signed URL for one object, method, and identity.
    async fn presign(
        &self,
        key: &str,
        method: AccessMethod,
        ttl: Duration,
        user_id: &str,
    ) -> StorageResult<SignedUrl>;

    /// Get the name of this storage backend ("s3", "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during startup so the server never reports healthy with an
    /// unreachable backend. The default is a no-op for backends without a
    /// meaningful connectivity check.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
