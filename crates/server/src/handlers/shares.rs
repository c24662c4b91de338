//! Share management endpoints.

use crate::access::is_owner;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::PATH_SET;
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::HeaderMap;
use parcel_core::record::ShareKind;
use parcel_core::{ObjectPath, UserId};
use parcel_metadata::{AccessRecordRepo, ShareGrant};
use parcel_storage::{AccessMethod, ObjectStore};
use percent_encoding::utf8_percent_encode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Request body for creating a share grant.
#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    /// Recipient user id.
    pub recipient: String,
    /// Download quota ceiling for the recipient.
    pub max_downloads: i64,
    /// Internal (recipient logs in) or external (pre-minted link).
    #[serde(default)]
    pub kind: ShareKind,
}

/// Response for a created share grant.
#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub object_path: String,
    pub recipient: String,
    pub max_downloads: i64,
    pub kind: String,
    /// The link to hand to the recipient.
    pub share_url: String,
    pub granted_at: String,
}

/// POST /v1/shares/{*path} - Grant a recipient bounded access to an object.
///
/// Re-sharing overwrites the previous grant for the same recipient; whether
/// the consumed download count resets is governed by
/// `shares.reshare_resets_quota`.
pub async fn create_share(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    auth: Option<Extension<AuthenticatedUser>>,
    Json(body): Json<CreateShareRequest>,
) -> ApiResult<Json<ShareResponse>> {
    let Some(Extension(auth)) = auth else {
        return Err(ApiError::Unauthorized("authentication required".to_string()));
    };
    let owner = auth.user().clone();

    let object = ObjectPath::parse(&path)?;
    let recipient = UserId::parse(&body.recipient)?;
    if recipient == owner {
        return Err(ApiError::BadRequest(
            "cannot share an object with yourself".to_string(),
        ));
    }
    if body.max_downloads < 0 {
        return Err(ApiError::BadRequest(
            "max_downloads must be non-negative".to_string(),
        ));
    }

    if !is_owner(state.metadata.as_ref(), &object, &owner).await? {
        return Err(ApiError::Forbidden(
            "only the owner can share an object".to_string(),
        ));
    }

    // Sharing assumes the object was uploaded already.
    if !state.storage.exists(object.as_str()).await? {
        return Err(ApiError::NotFound(format!("object not found: {object}")));
    }

    // External recipients never authenticate, so their link is minted now
    // with the long TTL and stored on the grant.
    let external_url = match body.kind {
        ShareKind::External => Some(
            state
                .storage
                .presign(
                    object.as_str(),
                    AccessMethod::Get,
                    state.config.links.external_ttl(),
                    recipient.as_str(),
                )
                .await?
                .url,
        ),
        ShareKind::Internal => None,
    };

    let granted_at = OffsetDateTime::now_utc();
    let grant = ShareGrant {
        object: object.clone(),
        owner: owner.clone(),
        recipient: recipient.clone(),
        max_downloads: body.max_downloads,
        kind: body.kind,
        external_url,
        granted_at,
    };

    state
        .metadata
        .record_share(&grant, state.config.shares.reshare_resets_quota)
        .await?;
    metrics::SHARES_CREATED.inc();
    tracing::info!(object = %object, owner = %owner, recipient = %recipient,
        max_downloads = body.max_downloads, kind = %body.kind, "share recorded");

    let share_url = format!(
        "{}/download/{}",
        crate::auth::base_url(&state, &headers)?,
        utf8_percent_encode(object.as_str(), PATH_SET)
    );

    Ok(Json(ShareResponse {
        object_path: object.as_str().to_string(),
        recipient: recipient.as_str().to_string(),
        max_downloads: body.max_downloads,
        kind: body.kind.as_str().to_string(),
        share_url,
        granted_at: granted_at
            .format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))?,
    }))
}

/// One share grant in a listing.
#[derive(Debug, Serialize)]
pub struct ShareInfo {
    pub recipient: String,
    pub max_downloads: Option<i64>,
    pub kind: Option<String>,
    pub granted_at: String,
}

/// Listing of an object's share grants.
#[derive(Debug, Serialize)]
pub struct ListSharesResponse {
    pub object_path: String,
    pub shares: Vec<ShareInfo>,
}

/// GET /v1/shares/{*path} - List share grants for an owned object.
pub async fn list_shares(
    State(state): State<AppState>,
    Path(path): Path<String>,
    auth: Option<Extension<AuthenticatedUser>>,
) -> ApiResult<Json<ListSharesResponse>> {
    let Some(Extension(auth)) = auth else {
        return Err(ApiError::Unauthorized("authentication required".to_string()));
    };
    let object = ObjectPath::parse(&path)?;

    if !is_owner(state.metadata.as_ref(), &object, auth.user()).await? {
        return Err(ApiError::Forbidden(
            "only the owner can list shares".to_string(),
        ));
    }

    let rows = state.metadata.list_shares(&object).await?;
    let shares = rows
        .into_iter()
        .map(|row| {
            Ok(ShareInfo {
                recipient: row.user_id,
                max_downloads: row.max_downloads,
                kind: row.share_kind,
                granted_at: row
                    .created_at
                    .format(&Rfc3339)
                    .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))?,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(ListSharesResponse {
        object_path: object.as_str().to_string(),
        shares,
    }))
}
