//! The download pipeline endpoint.

use crate::access::{DownloadOutcome, authorize_and_issue};
use crate::auth::{callback_url, get_auth, verifier_cookie};
use crate::error::{ApiResult, ErrorResponse};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use parcel_core::ObjectPath;
use parcel_identity::LoginChallenge;

/// Build the 302 login redirect carrying the PKCE challenge.
///
/// `resume_path` rides in the OAuth `state` parameter so the callback can
/// send the browser back to the original download after login.
pub(crate) fn login_redirect(
    state: &AppState,
    headers: &HeaderMap,
    resume_path: Option<&str>,
) -> ApiResult<Response> {
    let redirect_uri = callback_url(state, headers)?;
    let challenge = LoginChallenge::new(&state.config.identity, &redirect_uri, resume_path)?;
    metrics::LOGIN_REDIRECTS.inc();

    let cookie = verifier_cookie(&challenge.verifier, state.config.server.secure_cookies);
    let response = Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, challenge.auth_url)
        .header(SET_COOKIE, cookie)
        .body(Body::empty())
        .map_err(|e| crate::error::ApiError::Internal(format!("response build failed: {e}")))?;
    Ok(response)
}

/// GET /download/{*path} - The core pipeline: authenticate, authorize against
/// ownership/share/quota records, mint a signed link, record the grant, and
/// redirect.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    metrics::DOWNLOAD_REQUESTS.inc();

    let object = ObjectPath::parse(&path)?;

    // Unauthenticated browsers get the login flow, never a hard 401.
    let Some(auth) = get_auth(&req) else {
        return login_redirect(&state, req.headers(), Some(object.as_str()));
    };
    let user = auth.user().clone();

    match authorize_and_issue(&state, &object, &user).await? {
        DownloadOutcome::Issued(link) => {
            metrics::DOWNLOADS_ALLOWED.inc();
            tracing::info!(object = %object, user = %user, "download link issued");
            // 307 keeps the method on the redirect to the signed URL.
            let response = Response::builder()
                .status(StatusCode::TEMPORARY_REDIRECT)
                .header(LOCATION, link.url)
                .body(Body::empty())
                .map_err(|e| {
                    crate::error::ApiError::Internal(format!("response build failed: {e}"))
                })?;
            Ok(response)
        }
        DownloadOutcome::Denied(reason) => {
            metrics::DOWNLOADS_DENIED
                .with_label_values(&[reason.as_str()])
                .inc();
            tracing::info!(object = %object, user = %user, reason = reason.as_str(),
                "download denied");
            Ok((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    code: "forbidden".to_string(),
                    message: format!("access denied: {}", reason.message()),
                }),
            )
                .into_response())
        }
    }
}
