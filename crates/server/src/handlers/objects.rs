//! Local fulfilment of filesystem-backend signed links.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;
use parcel_core::ObjectPath;
use parcel_signer::LinkClaims;
use parcel_storage::{AccessMethod, ObjectStore};
use serde::Deserialize;
use time::OffsetDateTime;

/// Signed-link query parameters, as minted by the filesystem backend.
#[derive(Debug, Deserialize)]
pub struct SignedLinkParams {
    pub user: String,
    pub method: String,
    pub expires: i64,
    pub sig: String,
}

/// GET /object/{*path} - Serve an object against a locally signed link.
///
/// The signature covers key, method, identity, and expiry; verification
/// failure and expiry are both terse 403s so link holders learn nothing
/// about which claim was wrong.
pub async fn serve_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<SignedLinkParams>,
) -> ApiResult<Response> {
    let object = ObjectPath::parse(&path)?;

    let method = AccessMethod::parse(&params.method)
        .map_err(|_| ApiError::Forbidden("invalid link".to_string()))?;
    if method != AccessMethod::Get {
        return Err(ApiError::Forbidden("invalid link".to_string()));
    }

    let claims = LinkClaims {
        object: object.as_str(),
        method: params.method.as_str(),
        user: params.user.as_str(),
        expires_unix: params.expires,
    };
    state.signer.verify(&claims, &params.sig)?;

    if params.expires < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(ApiError::Forbidden("link expired".to_string()));
    }

    // The identity bound into the link tags the access for audit.
    tracing::info!(object = %object, user = %params.user, "serving signed object link");

    let meta = state.storage.head(object.as_str()).await?;
    let stream = state.storage.get_stream(object.as_str()).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, meta.size)
        .header(
            CONTENT_TYPE,
            meta.content_type
                .as_deref()
                .unwrap_or("application/octet-stream"),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("response build failed: {e}")))?;
    Ok(response)
}
