//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Externally reachable base URL of this instance (e.g.,
    /// "https://files.example.com"). Used for OAuth redirect URIs and for
    /// locally signed object links. Falls back to the request Host header
    /// when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, restrict the endpoint to scraper IPs at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Mark session cookies Secure (default: true). Disable only for plain
    /// HTTP development setups.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: None,
            metrics_enabled: default_metrics_enabled(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage. Download links are HMAC-signed URLs served
    /// by this instance's /object endpoint.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage. Download links are SigV4 presigned URLs.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services; AWS S3 wants virtual-hosted style.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (recommended for testing and single-instance deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer the PARCEL_METADATA__PASSWORD env var over config files.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => {
                    Err("postgres config requires 'database' when using individual fields"
                        .to_string())
                }
            },
        }
    }
}

/// Identity provider (OAuth2 authorization-code + PKCE) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the hosted identity provider
    /// (e.g., "https://auth.example.com").
    pub base_url: String,
    /// OAuth2 client id registered for this service.
    pub client_id: String,
    /// Requested scope (default: "openid").
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "openid".to_string()
}

impl IdentityConfig {
    /// The authorization endpoint for login redirects.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/authorize", self.base_url.trim_end_matches('/'))
    }

    /// The token endpoint for the code exchange.
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.base_url.trim_end_matches('/'))
    }

    /// The userinfo endpoint for resolving a subject from an access token.
    pub fn userinfo_endpoint(&self) -> String {
        format!("{}/oauth2/userInfo", self.base_url.trim_end_matches('/'))
    }

    /// The revocation endpoint for session logout.
    pub fn revoke_endpoint(&self) -> String {
        format!("{}/oauth2/revoke", self.base_url.trim_end_matches('/'))
    }

    /// The hosted logout page users are redirected to after local logout.
    pub fn logout_endpoint(&self) -> String {
        format!("{}/logout", self.base_url.trim_end_matches('/'))
    }

    /// Validate identity configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("identity.base_url must be set".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "identity.base_url must be an http(s) URL: {}",
                self.base_url
            ));
        }
        if self.client_id.is_empty() {
            return Err("identity.client_id must be set".to_string());
        }
        Ok(())
    }
}

/// Signing key source for locally issued links.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkKeyConfig {
    /// Key stored in a file.
    File {
        /// Path to the key file.
        path: PathBuf,
    },
    /// Key stored in an environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Key provided directly as a value (NOT recommended for production).
    Value {
        /// The encoded signing key.
        key: String,
    },
    /// Generate an ephemeral key (development only; links die with the process).
    Generate,
}

impl Default for LinkKeyConfig {
    fn default() -> Self {
        Self::Generate
    }
}

/// Signed-link issuance configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Lifetime of freshly issued download links, in seconds. Kept short on
    /// purpose: the authorization decision, not the link, is the durable
    /// access-control boundary.
    #[serde(default = "default_link_ttl_secs")]
    pub ttl_secs: u64,
    /// Lifetime of pre-minted links for external shares, in seconds.
    #[serde(default = "default_external_ttl_secs")]
    pub external_ttl_secs: u64,
    /// Lifetime of presigned upload URLs, in seconds.
    #[serde(default = "default_upload_ttl_secs")]
    pub upload_ttl_secs: u64,
    /// Signing key for locally issued links.
    #[serde(default)]
    pub signing_key: LinkKeyConfig,
}

fn default_link_ttl_secs() -> u64 {
    30
}

fn default_external_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_upload_ttl_secs() -> u64 {
    900 // 15 minutes
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_link_ttl_secs(),
            external_ttl_secs: default_external_ttl_secs(),
            upload_ttl_secs: default_upload_ttl_secs(),
            signing_key: LinkKeyConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Get the fresh-link lifetime as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Get the external-link lifetime as a Duration.
    pub fn external_ttl(&self) -> Duration {
        Duration::from_secs(self.external_ttl_secs)
    }

    /// Get the upload-link lifetime as a Duration.
    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_ttl_secs)
    }

    /// Validate link configuration for dangerous settings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.ttl_secs == 0 {
            return Err("links.ttl_secs cannot be 0".to_string());
        }
        if self.ttl_secs > 3600 {
            warnings.push(format!(
                "links.ttl_secs={} is long for a download link; links that outlive \
                 the quota check can be replayed outside the engine's control",
                self.ttl_secs
            ));
        }
        if self.external_ttl_secs < self.ttl_secs {
            warnings.push(
                "links.external_ttl_secs is shorter than links.ttl_secs; external shares \
                 will expire before fresh links do"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

/// Share semantics configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Whether re-sharing an object with the same recipient clears their
    /// consumed download count (default: false — prior downloads keep
    /// counting against the new ceiling).
    #[serde(default)]
    pub reshare_resets_quota: bool,
    /// Whether owner downloads append download records (default: true).
    /// Owner records never participate in authorization either way.
    #[serde(default = "default_record_owner_downloads")]
    pub record_owner_downloads: bool,
}

fn default_record_owner_downloads() -> bool {
    true
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            reshare_resets_quota: false,
            record_owner_downloads: default_record_owner_downloads(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Identity provider configuration (required).
    pub identity: IdentityConfig,
    /// Signed-link configuration.
    #[serde(default)]
    pub links: LinkConfig,
    /// Share semantics configuration.
    #[serde(default)]
    pub shares: ShareConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata, an
    /// ephemeral signing key, and a placeholder identity provider.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                public_base_url: Some("http://127.0.0.1:8080".to_string()),
                secure_cookies: false,
                ..ServerConfig::default()
            },
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            identity: IdentityConfig {
                base_url: "https://auth.parcel.test".to_string(),
                client_id: "test-client".to_string(),
                scope: default_scope(),
            },
            links: LinkConfig::default(),
            shares: ShareConfig::default(),
        }
    }
}
