//! Upload endpoint: presigned PUT URLs plus ownership recording.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Extension, Path, State};
use parcel_core::ObjectPath;
use parcel_metadata::{AccessRecordRepo, AccessRecordRow};
use parcel_storage::{AccessMethod, ObjectStore};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Response for a presigned upload URL.
#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    pub object_path: String,
    /// Presigned PUT URL carrying the uploader identity as signed metadata.
    pub url: String,
    pub expires_at: String,
}

/// POST /v1/uploads/{*path} - Issue a presigned upload URL and record
/// ownership.
///
/// The OWNER record is written at issuance; it is the record the
/// authorization engine later consults, and re-issuing for the same
/// (object, owner) is an idempotent overwrite.
pub async fn create_upload_url(
    State(state): State<AppState>,
    Path(path): Path<String>,
    auth: Option<Extension<AuthenticatedUser>>,
) -> ApiResult<Json<UploadUrlResponse>> {
    let Some(Extension(auth)) = auth else {
        return Err(ApiError::Unauthorized("authentication required".to_string()));
    };
    let user = auth.user().clone();

    let object = ObjectPath::parse(&path)?;

    let signed = state
        .storage
        .presign(
            object.as_str(),
            AccessMethod::Put,
            state.config.links.upload_ttl(),
            user.as_str(),
        )
        .await?;

    let row = AccessRecordRow::owner(&object, &user, OffsetDateTime::now_utc());
    state.metadata.put_record(&row).await?;

    metrics::UPLOAD_LINKS_ISSUED.inc();
    tracing::info!(object = %object, user = %user, "upload link issued, ownership recorded");

    Ok(Json(UploadUrlResponse {
        object_path: object.as_str().to_string(),
        url: signed.url,
        expires_at: signed
            .expires_at
            .format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))?,
    }))
}
