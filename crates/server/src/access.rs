//! Authorization and quota engine, plus the link-issuance pipeline.
//!
//! `decide` is the pure decision function over the current record snapshot.
//! `authorize_and_issue` is the full allow-and-record path: for shared
//! recipients the allow decision and the download record are one atomic
//! claim in the metadata store, so a quota of N can never be oversold by
//! concurrent requests.

use crate::error::ApiResult;
use crate::state::AppState;
use parcel_core::record::{RecordKey, RecordType, ShareKind};
use parcel_core::{ObjectPath, UserId};
use parcel_metadata::{AccessRecordRepo, AccessRecordRow, MetadataStore};
use parcel_storage::{AccessMethod, ObjectStore, SignedUrl};
use time::OffsetDateTime;

/// Why access was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// No OWNER and no SHARE record for this (object, user).
    NotShared,
    /// SHARE exists but the download quota is used up (or zero).
    QuotaExhausted,
    /// SHARE exists but its quota field is missing or negative. Ambiguous
    /// grants fail closed.
    MalformedShare,
}

impl DenyReason {
    /// Metric label for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotShared => "not_shared",
            Self::QuotaExhausted => "quota_exhausted",
            Self::MalformedShare => "malformed_share",
        }
    }

    /// Terse caller-facing message. Record internals stay in the log;
    /// malformed grants are indistinguishable from unshared objects.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotShared | Self::MalformedShare => "not shared",
            Self::QuotaExhausted => "quota exhausted",
        }
    }
}

/// The authorization decision for one (object, user) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Access granted. `ownership` is true when the OWNER record decided it.
    Allow { ownership: bool },
    /// Access denied.
    Deny(DenyReason),
}

/// A parsed snapshot of one user's records for one object.
#[derive(Debug, Default)]
struct RecordSnapshot {
    is_owner: bool,
    share: Option<ShareView>,
    download_count: i64,
}

/// The share-grant fields the engine consumes.
#[derive(Debug)]
struct ShareView {
    max_downloads: Option<i64>,
    kind: ShareKind,
    external_url: Option<String>,
}

impl RecordSnapshot {
    async fn load(
        metadata: &dyn MetadataStore,
        object: &ObjectPath,
        user: &UserId,
    ) -> ApiResult<Self> {
        let rows = metadata
            .query_prefix(object, &RecordKey::user_prefix(user))
            .await?;
        Ok(Self::from_rows(&rows))
    }

    fn from_rows(rows: &[AccessRecordRow]) -> Self {
        let mut snapshot = Self::default();
        for row in rows {
            match row.kind() {
                Some(RecordType::Owner) => snapshot.is_owner = true,
                Some(RecordType::Share) => {
                    snapshot.share = Some(ShareView {
                        max_downloads: row.max_downloads,
                        kind: row
                            .share_kind
                            .as_deref()
                            .and_then(|k| ShareKind::parse(k).ok())
                            .unwrap_or_default(),
                        external_url: row.external_url.clone(),
                    });
                }
                Some(RecordType::Download) => snapshot.download_count += 1,
                None => {
                    tracing::warn!(record_key = %row.record_key, "skipping unparsable record");
                }
            }
        }
        snapshot
    }

    /// The pure decision over this snapshot.
    fn decide(&self) -> Access {
        if self.is_owner {
            // Ownership short-circuits quota entirely.
            return Access::Allow { ownership: true };
        }
        let Some(share) = &self.share else {
            return Access::Deny(DenyReason::NotShared);
        };
        match share.max_downloads {
            None => Access::Deny(DenyReason::MalformedShare),
            Some(max) if max < 0 => Access::Deny(DenyReason::MalformedShare),
            Some(max) if self.download_count < max => Access::Allow { ownership: false },
            Some(_) => Access::Deny(DenyReason::QuotaExhausted),
        }
    }
}

/// Decide ALLOW/DENY for one (object, user) pair.
///
/// Pure over stored state: no side effects, same outcome for repeated calls
/// with no intervening writes.
pub async fn decide(
    metadata: &dyn MetadataStore,
    object: &ObjectPath,
    user: &UserId,
) -> ApiResult<Access> {
    let snapshot = RecordSnapshot::load(metadata, object, user).await?;
    Ok(snapshot.decide())
}

/// Check whether `user` owns `object`.
pub async fn is_owner(
    metadata: &dyn MetadataStore,
    object: &ObjectPath,
    user: &UserId,
) -> ApiResult<bool> {
    let rows = metadata
        .query_prefix(object, &RecordKey::owner(user))
        .await?;
    Ok(!rows.is_empty())
}

/// A link issued by the pipeline.
#[derive(Clone, Debug)]
pub struct IssuedLink {
    /// The URL to redirect the caller to.
    pub url: String,
    /// Expiry of freshly minted links; pre-minted external links are opaque.
    pub expires_at: Option<OffsetDateTime>,
}

impl From<SignedUrl> for IssuedLink {
    fn from(signed: SignedUrl) -> Self {
        Self {
            url: signed.url,
            expires_at: Some(signed.expires_at),
        }
    }
}

/// Outcome of the download pipeline for an authenticated caller.
#[derive(Clone, Debug)]
pub enum DownloadOutcome {
    /// Access granted and a link issued.
    Issued(IssuedLink),
    /// Access denied.
    Denied(DenyReason),
}

/// Run authorization, link issuance, and grant recording for a download.
///
/// Owners: allow unconditionally, mint a fresh link, and append a download
/// record when configured to. Shared recipients: mint the link first (a
/// failed mint must not consume quota), then atomically claim one download
/// against the share's ceiling; losing the claim is a quota denial even if
/// the earlier snapshot looked fine, which closes the check-then-act race.
pub async fn authorize_and_issue(
    state: &AppState,
    object: &ObjectPath,
    user: &UserId,
) -> ApiResult<DownloadOutcome> {
    let snapshot = RecordSnapshot::load(state.metadata.as_ref(), object, user).await?;

    match snapshot.decide() {
        Access::Deny(reason) => Ok(DownloadOutcome::Denied(reason)),
        Access::Allow { ownership: true } => {
            let link = state
                .storage
                .presign(
                    object.as_str(),
                    AccessMethod::Get,
                    state.config.links.ttl(),
                    user.as_str(),
                )
                .await?;
            if state.config.shares.record_owner_downloads {
                let row = AccessRecordRow::download(object, user, OffsetDateTime::now_utc());
                state.metadata.put_record(&row).await?;
            }
            Ok(DownloadOutcome::Issued(link.into()))
        }
        Access::Allow { ownership: false } => {
            // decide() only allows with a well-formed quota present.
            let share = snapshot.share.as_ref();
            let max_downloads = share.and_then(|s| s.max_downloads).unwrap_or(0);

            let link = match share.filter(|s| s.kind == ShareKind::External) {
                Some(share) => match &share.external_url {
                    // External grants return the stored link verbatim.
                    Some(url) => IssuedLink {
                        url: url.clone(),
                        expires_at: None,
                    },
                    None => {
                        tracing::warn!(object = %object, user = %user,
                            "external share has no stored link");
                        return Ok(DownloadOutcome::Denied(DenyReason::MalformedShare));
                    }
                },
                None => state
                    .storage
                    .presign(
                        object.as_str(),
                        AccessMethod::Get,
                        state.config.links.ttl(),
                        user.as_str(),
                    )
                    .await?
                    .into(),
            };

            let claimed = state
                .metadata
                .claim_download(object, user, max_downloads, OffsetDateTime::now_utc())
                .await?;
            if !claimed {
                return Ok(DownloadOutcome::Denied(DenyReason::QuotaExhausted));
            }
            Ok(DownloadOutcome::Issued(link))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, max_downloads: Option<i64>) -> AccessRecordRow {
        let parsed = RecordKey::parse(key).unwrap();
        AccessRecordRow {
            object_path: "report.csv".to_string(),
            record_key: key.to_string(),
            user_id: parsed.user.as_str().to_string(),
            record_type: parsed.record_type.as_str().to_string(),
            owner_user_id: None,
            max_downloads,
            share_kind: None,
            external_url: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn owner_allows_regardless_of_other_records() {
        let rows = vec![
            row("alice#OWNER", None),
            row("alice#SHARE", Some(0)),
            row("alice#DOWNLOAD#2026-08-05T12:00:00Z", None),
        ];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Allow { ownership: true }
        );
    }

    #[test]
    fn no_records_denies() {
        assert_eq!(
            RecordSnapshot::from_rows(&[]).decide(),
            Access::Deny(DenyReason::NotShared)
        );
    }

    #[test]
    fn share_allows_below_quota() {
        let rows = vec![
            row("bob#SHARE", Some(2)),
            row("bob#DOWNLOAD#2026-08-05T12:00:00Z", None),
        ];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Allow { ownership: false }
        );
    }

    #[test]
    fn share_denies_at_quota() {
        let rows = vec![
            row("bob#SHARE", Some(2)),
            row("bob#DOWNLOAD#2026-08-05T12:00:00Z", None),
            row("bob#DOWNLOAD#2026-08-05T12:00:01Z", None),
        ];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Deny(DenyReason::QuotaExhausted)
        );
    }

    #[test]
    fn zero_quota_share_always_denies() {
        let rows = vec![row("bob#SHARE", Some(0))];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Deny(DenyReason::QuotaExhausted)
        );
    }

    #[test]
    fn missing_quota_fails_closed() {
        let rows = vec![row("bob#SHARE", None)];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Deny(DenyReason::MalformedShare)
        );

        let rows = vec![row("bob#SHARE", Some(-1))];
        assert_eq!(
            RecordSnapshot::from_rows(&rows).decide(),
            Access::Deny(DenyReason::MalformedShare)
        );
    }

    #[test]
    fn deny_messages_are_terse() {
        assert_eq!(DenyReason::NotShared.message(), "not shared");
        assert_eq!(DenyReason::MalformedShare.message(), "not shared");
        assert_eq!(DenyReason::QuotaExhausted.message(), "quota exhausted");
    }

    #[tokio::test]
    async fn decide_is_pure_over_stored_state() {
        let temp = tempfile::tempdir().unwrap();
        let store = parcel_metadata::SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        let object = ObjectPath::parse("report.csv").unwrap();
        let bob = UserId::parse("bob").unwrap();

        assert_eq!(
            decide(&store, &object, &bob).await.unwrap(),
            Access::Deny(DenyReason::NotShared)
        );

        let grant = parcel_metadata::ShareGrant {
            object: object.clone(),
            owner: UserId::parse("alice").unwrap(),
            recipient: bob.clone(),
            max_downloads: 1,
            kind: ShareKind::Internal,
            external_url: None,
            granted_at: OffsetDateTime::now_utc(),
        };
        store.record_share(&grant, false).await.unwrap();

        // No side effects: repeated calls see the same stored state.
        let first = decide(&store, &object, &bob).await.unwrap();
        let second = decide(&store, &object, &bob).await.unwrap();
        assert_eq!(first, Access::Allow { ownership: false });
        assert_eq!(first, second);
    }
}
