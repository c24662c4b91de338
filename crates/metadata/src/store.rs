//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{AccessRecordRow, ShareGrant};
use async_trait::async_trait;
use parcel_core::record::RecordKey;
use parcel_core::{ObjectPath, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Access-record schema, shared verbatim between SQLite and PostgreSQL apart
/// from the timestamp column type.
const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS access_records (
    object_path   TEXT NOT NULL,
    record_key    TEXT NOT NULL,
    user_id       TEXT NOT NULL,
    record_type   TEXT NOT NULL,
    owner_user_id TEXT,
    max_downloads INTEGER,
    share_kind    TEXT,
    external_url  TEXT,
    created_at    TEXT NOT NULL,
    PRIMARY KEY (object_path, record_key)
);
CREATE INDEX IF NOT EXISTS idx_access_records_type
    ON access_records (object_path, record_type);
";

/// Escape a literal prefix for a `LIKE ? ESCAPE '\'` pattern and append `%`.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Repository for access records.
///
/// The underlying contract mirrors a key-value table keyed by
/// `(object_path, record_key)` with prefix queries over the sort key; the
/// typed operations below are the only ones the service needs.
#[async_trait]
pub trait AccessRecordRepo: Send + Sync {
    /// Upsert a single record (put semantics: last write wins).
    async fn put_record(&self, record: &AccessRecordRow) -> MetadataResult<()>;

    /// Fetch all records for an object whose key starts with `key_prefix`.
    async fn query_prefix(
        &self,
        object: &ObjectPath,
        key_prefix: &str,
    ) -> MetadataResult<Vec<AccessRecordRow>>;

    /// Count a user's DOWNLOAD records for an object.
    async fn count_downloads(&self, object: &ObjectPath, user: &UserId) -> MetadataResult<u64>;

    /// Atomically append a DOWNLOAD record if and only if the user's current
    /// download count is below `max_downloads`. Returns whether the download
    /// was claimed.
    ///
    /// This is the one write that must be race-free: two concurrent downloads
    /// against a quota of 1 must not both succeed.
    async fn claim_download(
        &self,
        object: &ObjectPath,
        user: &UserId,
        max_downloads: i64,
        at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Upsert a SHARE record. When `reset_quota` is set, the recipient's
    /// DOWNLOAD records are deleted in the same transaction so the new
    /// ceiling starts from zero consumption.
    async fn record_share(&self, grant: &ShareGrant, reset_quota: bool) -> MetadataResult<()>;

    /// List the SHARE records for an object (all recipients).
    async fn list_shares(&self, object: &ObjectPath) -> MetadataResult<Vec<AccessRecordRow>>;
}

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: AccessRecordRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MetadataError::Config(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers, which also makes the
            // count-then-insert inside claim_download atomic: no other claim
            // can interleave while this one holds the connection.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SQLITE_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AccessRecordRepo for SqliteStore {
    async fn put_record(&self, record: &AccessRecordRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO access_records
                 (object_path, record_key, user_id, record_type, owner_user_id,
                  max_downloads, share_kind, external_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (object_path, record_key) DO UPDATE SET
                 owner_user_id = excluded.owner_user_id,
                 max_downloads = excluded.max_downloads,
                 share_kind = excluded.share_kind,
                 external_url = excluded.external_url,
                 created_at = excluded.created_at",
        )
        .bind(&record.object_path)
        .bind(&record.record_key)
        .bind(&record.user_id)
        .bind(&record.record_type)
        .bind(&record.owner_user_id)
        .bind(record.max_downloads)
        .bind(&record.share_kind)
        .bind(&record.external_url)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_prefix(
        &self,
        object: &ObjectPath,
        key_prefix: &str,
    ) -> MetadataResult<Vec<AccessRecordRow>> {
        let rows = sqlx::query_as::<_, AccessRecordRow>(
            "SELECT * FROM access_records
             WHERE object_path = ? AND record_key LIKE ? ESCAPE '\\'
             ORDER BY record_key",
        )
        .bind(object.as_str())
        .bind(like_prefix(key_prefix))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_downloads(&self, object: &ObjectPath, user: &UserId) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM access_records
             WHERE object_path = ? AND record_key LIKE ? ESCAPE '\\'",
        )
        .bind(object.as_str())
        .bind(like_prefix(&RecordKey::download_prefix(user)))
        .fetch_one(&self.pool)
        .await?;
        Ok(count.unsigned_abs())
    }

    async fn claim_download(
        &self,
        object: &ObjectPath,
        user: &UserId,
        max_downloads: i64,
        at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        if max_downloads <= 0 {
            return Ok(false);
        }

        // The pool is capped at one connection, so the transaction holds the
        // store's only writer for the count + insert pair.
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM access_records
             WHERE object_path = ? AND record_key LIKE ? ESCAPE '\\'",
        )
        .bind(object.as_str())
        .bind(like_prefix(&RecordKey::download_prefix(user)))
        .fetch_one(&mut *tx)
        .await?;

        if count >= max_downloads {
            tx.rollback().await?;
            return Ok(false);
        }

        let record = AccessRecordRow::download(object, user, at);
        sqlx::query(
            "INSERT INTO access_records
                 (object_path, record_key, user_id, record_type, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.object_path)
        .bind(&record.record_key)
        .bind(&record.user_id)
        .bind(&record.record_type)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn record_share(&self, grant: &ShareGrant, reset_quota: bool) -> MetadataResult<()> {
        let record = AccessRecordRow::share(grant);
        let mut tx = self.pool.begin().await?;

        if reset_quota {
            sqlx::query(
                "DELETE FROM access_records
                 WHERE object_path = ? AND record_key LIKE ? ESCAPE '\\'",
            )
            .bind(&record.object_path)
            .bind(like_prefix(&RecordKey::download_prefix(&grant.recipient)))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO access_records
                 (object_path, record_key, user_id, record_type, owner_user_id,
                  max_downloads, share_kind, external_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (object_path, record_key) DO UPDATE SET
                 owner_user_id = excluded.owner_user_id,
                 max_downloads = excluded.max_downloads,
                 share_kind = excluded.share_kind,
                 external_url = excluded.external_url,
                 created_at = excluded.created_at",
        )
        .bind(&record.object_path)
        .bind(&record.record_key)
        .bind(&record.user_id)
        .bind(&record.record_type)
        .bind(&record.owner_user_id)
        .bind(record.max_downloads)
        .bind(&record.share_kind)
        .bind(&record.external_url)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_shares(&self, object: &ObjectPath) -> MetadataResult<Vec<AccessRecordRow>> {
        let rows = sqlx::query_as::<_, AccessRecordRow>(
            "SELECT * FROM access_records
             WHERE object_path = ? AND record_type = 'SHARE'
             ORDER BY record_key",
        )
        .bind(object.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
