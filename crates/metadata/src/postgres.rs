//! PostgreSQL metadata store.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{AccessRecordRow, ShareGrant};
use crate::store::{AccessRecordRepo, MetadataStore, like_prefix};
use async_trait::async_trait;
use parcel_core::record::RecordKey;
use parcel_core::{ObjectPath, UserId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use time::OffsetDateTime;

const PG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS access_records (
    object_path   TEXT NOT NULL,
    record_key    TEXT NOT NULL,
    user_id       TEXT NOT NULL,
    record_type   TEXT NOT NULL,
    owner_user_id TEXT,
    max_downloads BIGINT,
    share_kind    TEXT,
    external_url  TEXT,
    created_at    TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (object_path, record_key)
);
CREATE INDEX IF NOT EXISTS idx_access_records_type
    ON access_records (object_path, record_type);
";

const UPSERT_SQL: &str = "INSERT INTO access_records
     (object_path, record_key, user_id, record_type, owner_user_id,
      max_downloads, share_kind, external_url, created_at)
 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
 ON CONFLICT (object_path, record_key) DO UPDATE SET
     owner_user_id = excluded.owner_user_id,
     max_downloads = excluded.max_downloads,
     share_kind = excluded.share_kind,
     external_url = excluded.external_url,
     created_at = excluded.created_at";

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect using a connection URL.
    pub async fn from_url(url: &str, max_connections: u32) -> MetadataResult<Self> {
        tracing::info!("Connecting to PostgreSQL metadata store");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect using individual parameters.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        max_connections: u32,
    ) -> MetadataResult<Self> {
        let mut opts = sqlx::postgres::PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);
        if let Some(username) = username {
            opts = opts.username(username);
        }
        if let Some(password) = password {
            opts = opts.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(PG_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AccessRecordRepo for PostgresStore {
    async fn put_record(&self, record: &AccessRecordRow) -> MetadataResult<()> {
        sqlx::query(UPSERT_SQL)
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
             WHERE object_path = $1 AND record_key LIKE $2 ESCAPE '\\'
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
             WHERE object_path = $1 AND record_key LIKE $2 ESCAPE '\\'",
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

        let mut tx = self.pool.begin().await?;

        // Serialize claims for the same (object, user) pair across all
        // connections. The lock is released at transaction end.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}#{}", object.as_str(), user.as_str()))
            .execute(&mut *tx)
            .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM access_records
             WHERE object_path = $1 AND record_key LIKE $2 ESCAPE '\\'",
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
             VALUES ($1, $2, $3, $4, $5)",
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
                 WHERE object_path = $1 AND record_key LIKE $2 ESCAPE '\\'",
            )
            .bind(&record.object_path)
            .bind(like_prefix(&RecordKey::download_prefix(&grant.recipient)))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(UPSERT_SQL)
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
             WHERE object_path = $1 AND record_type = 'SHARE'
             ORDER BY record_key",
        )
        .bind(object.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
