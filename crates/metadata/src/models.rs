//! Database models mapping to the access-record schema.

use parcel_core::record::{RecordKey, RecordType, ShareKind};
use parcel_core::{ObjectPath, UserId};
use sqlx::FromRow;
use time::OffsetDateTime;

/// One persisted access record.
///
/// The `(object_path, record_key)` pair is the primary key; `record_key`
/// encodes the user and the record type (see `parcel_core::record`). The
/// share-specific columns are NULL for OWNER and DOWNLOAD rows.
#[derive(Debug, Clone, FromRow)]
pub struct AccessRecordRow {
    pub object_path: String,
    pub record_key: String,
    pub user_id: String,
    pub record_type: String,
    /// Granting owner, SHARE rows only.
    pub owner_user_id: Option<String>,
    /// Download quota ceiling, SHARE rows only. NULL on a SHARE row means the
    /// grant is malformed; the authorization engine treats it as deny.
    pub max_downloads: Option<i64>,
    /// "internal" or "external", SHARE rows only.
    pub share_kind: Option<String>,
    /// Pre-minted URL for external shares.
    pub external_url: Option<String>,
    pub created_at: OffsetDateTime,
}

impl AccessRecordRow {
    /// Build an OWNER row.
    pub fn owner(object: &ObjectPath, user: &UserId, at: OffsetDateTime) -> Self {
        Self {
            object_path: object.as_str().to_string(),
            record_key: RecordKey::owner(user),
            user_id: user.as_str().to_string(),
            record_type: RecordType::Owner.as_str().to_string(),
            owner_user_id: None,
            max_downloads: None,
            share_kind: None,
            external_url: None,
            created_at: at,
        }
    }

    /// Build a DOWNLOAD row with a timestamp-suffixed key.
    pub fn download(object: &ObjectPath, user: &UserId, at: OffsetDateTime) -> Self {
        Self {
            object_path: object.as_str().to_string(),
            record_key: RecordKey::download(user, at),
            user_id: user.as_str().to_string(),
            record_type: RecordType::Download.as_str().to_string(),
            owner_user_id: None,
            max_downloads: None,
            share_kind: None,
            external_url: None,
            created_at: at,
        }
    }

    /// Build a SHARE row from a grant.
    pub fn share(grant: &ShareGrant) -> Self {
        Self {
            object_path: grant.object.as_str().to_string(),
            record_key: RecordKey::share(&grant.recipient),
            user_id: grant.recipient.as_str().to_string(),
            record_type: RecordType::Share.as_str().to_string(),
            owner_user_id: Some(grant.owner.as_str().to_string()),
            max_downloads: Some(grant.max_downloads),
            share_kind: Some(grant.kind.as_str().to_string()),
            external_url: grant.external_url.clone(),
            created_at: grant.granted_at,
        }
    }

    /// Decode the record type column.
    pub fn kind(&self) -> Option<RecordType> {
        RecordType::parse(&self.record_type).ok()
    }
}

/// A share grant to persist (owner → recipient with a quota).
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub object: ObjectPath,
    pub owner: UserId,
    pub recipient: UserId,
    /// Quota ceiling. Zero is a valid grant that always denies.
    pub max_downloads: i64,
    pub kind: ShareKind,
    /// Pre-minted URL, external grants only.
    pub external_url: Option<String>,
    pub granted_at: OffsetDateTime,
}
