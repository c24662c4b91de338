//! Server test harness.

use super::identity::FakeIdentityProvider;
use bytes::Bytes;
use parcel_core::config::{AppConfig, MetadataConfig, StorageConfig};
use parcel_core::record::ShareKind;
use parcel_core::{ObjectPath, UserId};
use parcel_metadata::{AccessRecordRepo, AccessRecordRow, MetadataStore, ShareGrant, SqliteStore};
use parcel_server::{AppState, create_router};
use parcel_signer::LinkSigner;
use parcel_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;

/// Base URL baked into test configuration and minted links.
pub const TEST_BASE_URL: &str = "http://127.0.0.1:8080";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub identity: Arc<FakeIdentityProvider>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and SQLite metadata.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let signer = Arc::new(LinkSigner::generate("test-links"));

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path, signer.clone(), TEST_BASE_URL)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let identity = Arc::new(FakeIdentityProvider::new());

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path,
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        modifier(&mut config);

        let state = AppState::new(config, storage, metadata, identity.clone(), signer);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            identity,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Register a session token for a user and return the Cookie header value.
    pub fn login(&self, user_id: &str) -> String {
        let token = format!("token-{user_id}");
        self.identity.register_token(&token, user_id);
        format!("access_token={token}")
    }

    /// Store object bytes directly in the backend.
    pub async fn seed_object(&self, path: &str, data: &[u8]) {
        self.state
            .storage
            .put(path, Bytes::copy_from_slice(data))
            .await
            .expect("Failed to seed object");
    }

    /// Write an OWNER record directly.
    pub async fn seed_owner(&self, path: &str, user: &str) {
        let object = ObjectPath::parse(path).expect("valid test path");
        let user = UserId::parse(user).expect("valid test user");
        self.state
            .metadata
            .put_record(&AccessRecordRow::owner(
                &object,
                &user,
                OffsetDateTime::now_utc(),
            ))
            .await
            .expect("Failed to seed owner record");
    }

    /// Write a SHARE record directly.
    pub async fn seed_share(&self, path: &str, owner: &str, recipient: &str, max_downloads: i64) {
        self.seed_share_with(path, owner, recipient, max_downloads, ShareKind::Internal, None)
            .await;
    }

    /// Write a SHARE record with full control over kind and external URL.
    pub async fn seed_share_with(
        &self,
        path: &str,
        owner: &str,
        recipient: &str,
        max_downloads: i64,
        kind: ShareKind,
        external_url: Option<String>,
    ) {
        let grant = ShareGrant {
            object: ObjectPath::parse(path).expect("valid test path"),
            owner: UserId::parse(owner).expect("valid test user"),
            recipient: UserId::parse(recipient).expect("valid test user"),
            max_downloads,
            kind,
            external_url,
            granted_at: OffsetDateTime::now_utc(),
        };
        self.state
            .metadata
            .record_share(&grant, false)
            .await
            .expect("Failed to seed share record");
    }

    /// Count a user's DOWNLOAD records for an object.
    pub async fn download_count(&self, path: &str, user: &str) -> u64 {
        let object = ObjectPath::parse(path).expect("valid test path");
        let user = UserId::parse(user).expect("valid test user");
        self.state
            .metadata
            .count_downloads(&object, &user)
            .await
            .expect("Failed to count downloads")
    }
}
