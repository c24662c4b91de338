//! Local filesystem storage backend.
//!
//! Signed links point back at this instance's `/object/{key}` endpoint: the
//! claims (key, method, identity, expiry) ride in the query string and are
//! HMAC-signed with the service's link key, mirroring what a cloud object
//! store's presigner does.

use crate::error::{StorageError, StorageResult};
use crate::traits::{AccessMethod, ByteStream, ObjectMeta, ObjectStore, SignedUrl};
use async_trait::async_trait;
use bytes::Bytes;
use parcel_signer::{LinkClaims, LinkSigner};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Characters percent-encoded in URL path segments (slashes stay literal).
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters percent-encoded in query values.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'=');

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
    signer: Arc<LinkSigner>,
    /// Base URL of the `/object` endpoint serving signed links.
    public_base_url: String,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(
        root: impl AsRef<Path>,
        signer: Arc<LinkSigner>,
        public_base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            signer,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the full path for a key, rejecting anything that could escape the
    /// storage root. Keys come from validated object paths, but this layer
    /// re-checks because it is the last one before the filesystem.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "key must be relative: {key}"
            )));
        }
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }
        Ok(self.root.join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key)?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key)?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        if metadata.is_dir() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(ObjectMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(OffsetDateTime::from),
            content_type: None,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.key_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        // Stream the file in chunks instead of loading it into memory
        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        // Write to a temp file then rename so readers never see partial data
        let temp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn presign(
        &self,
        key: &str,
        method: AccessMethod,
        ttl: Duration,
        user_id: &str,
    ) -> StorageResult<SignedUrl> {
        // Validate the key shape even though nothing touches disk here; a
        // link must never be minted for a key the read path would reject.
        self.key_path(key)?;

        let expires_at = OffsetDateTime::now_utc() + ttl;
        let claims = LinkClaims {
            object: key,
            method: method.as_str(),
            user: user_id,
            expires_unix: expires_at.unix_timestamp(),
        };
        let signature = self.signer.sign(&claims);

        let url = format!(
            "{base}/object/{path}?user={user}&method={method}&expires={expires}&sig={sig}",
            base = self.public_base_url,
            path = utf8_percent_encode(key, PATH_SET),
            user = utf8_percent_encode(user_id, QUERY_SET),
            method = method.as_str(),
            expires = claims.expires_unix,
            sig = signature,
        );

        Ok(SignedUrl { url, expires_at })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let temp = tempfile::tempdir().unwrap();
        let signer = Arc::new(LinkSigner::generate("test-links"));
        let backend = FilesystemBackend::new(temp.path(), signer, "http://127.0.0.1:8080")
            .await
            .unwrap();
        (temp, backend)
    }

    #[tokio::test]
    async fn put_head_and_stream() {
        let (_temp, backend) = backend().await;
        backend
            .put("reports/q2.csv", Bytes::from_static(b"a,b,c\n"))
            .await
            .unwrap();

        assert!(backend.exists("reports/q2.csv").await.unwrap());
        let meta = backend.head("reports/q2.csv").await.unwrap();
        assert_eq!(meta.size, 6);

        use futures::StreamExt;
        let mut stream = backend.get_stream("reports/q2.csv").await.unwrap();
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(data, b"a,b,c\n");
    }

    #[tokio::test]
    async fn head_missing_is_not_found() {
        let (_temp, backend) = backend().await;
        assert!(matches!(
            backend.head("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let (_temp, backend) = backend().await;
        assert!(backend.exists("../escape").await.is_err());
        assert!(backend.exists("/abs/path").await.is_err());
        assert!(
            backend
                .presign("a/../b", AccessMethod::Get, Duration::from_secs(30), "u")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn presign_embeds_signed_claims() {
        let (_temp, backend) = backend().await;
        let signed = backend
            .presign(
                "reports/q2.csv",
                AccessMethod::Get,
                Duration::from_secs(30),
                "alice",
            )
            .await
            .unwrap();

        assert!(signed.url.starts_with("http://127.0.0.1:8080/object/reports/q2.csv?"));
        assert!(signed.url.contains("user=alice"));
        assert!(signed.url.contains("method=GET"));
        assert!(signed.url.contains("sig="));

        // The signature verifies against the URL's own claims
        let url = url::Url::parse(&signed.url).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        let claims = LinkClaims {
            object: "reports/q2.csv",
            method: "GET",
            user: "alice",
            expires_unix: pairs["expires"].parse().unwrap(),
        };
        backend.signer.verify(&claims, &pairs["sig"]).unwrap();
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_temp, backend) = backend().await;
        backend.put("a.txt", Bytes::from_static(b"x")).await.unwrap();
        backend.delete("a.txt").await.unwrap();
        backend.delete("a.txt").await.unwrap();
        assert!(!backend.exists("a.txt").await.unwrap());
    }
}
