//! Authentication endpoints: login, OAuth callback, logout, whoami.

use crate::auth::{
    SESSION_COOKIE, VERIFIER_COOKIE, base_url, callback_url, cookie_value, expired_cookie,
    require_auth, session_cookie,
};
use crate::error::{ApiError, ApiResult};
use crate::handlers::PATH_SET;
use crate::handlers::download::login_redirect;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use parcel_core::ObjectPath;
use parcel_identity::IdentityProvider;
use percent_encoding::utf8_percent_encode;
use serde::{Deserialize, Serialize};

/// GET /login - Unconditional PKCE login redirect.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    login_redirect(&state, &headers, None)
}

/// Callback query parameters from the identity provider.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    /// Opaque state: the object path of the download that triggered login.
    pub state: Option<String>,
}

/// Token metadata returned when there is no request to resume.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub token_type: String,
    pub expires_in: u64,
}

/// GET /auth/callback - Complete the authorization-code exchange.
///
/// Exchanges the code plus the PKCE verifier (from the short-lived cookie)
/// for tokens, stores the access token in the session cookie, clears the
/// verifier, and resumes the original download when `state` carries one.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing code parameter".to_string()))?;
    let verifier = cookie_value(&headers, VERIFIER_COOKIE)
        .ok_or_else(|| ApiError::BadRequest("missing code_verifier cookie".to_string()))?;

    let redirect_uri = callback_url(&state, &headers)?;
    let tokens = state
        .identity
        .exchange_auth_code(&code, &verifier, &redirect_uri)
        .await?;

    let secure = state.config.server.secure_cookies;
    let session = session_cookie(&tokens.access_token, secure);
    let clear_verifier = expired_cookie(VERIFIER_COOKIE, secure);

    // Resume the original download when the state parameter carries a valid
    // object path; an unparsable state is dropped, not an error.
    let resume = params
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| ObjectPath::parse(s).ok());

    let response = match resume {
        Some(object) => {
            let location = format!(
                "{}/download/{}",
                base_url(&state, &headers)?,
                utf8_percent_encode(object.as_str(), PATH_SET)
            );
            Response::builder()
                .status(StatusCode::FOUND)
                .header(LOCATION, location)
                .header(SET_COOKIE, session)
                .header(SET_COOKIE, clear_verifier)
                .body(Body::empty())
        }
        None => {
            let body = serde_json::to_vec(&CallbackResponse {
                token_type: tokens.token_type.clone(),
                expires_in: tokens.expires_in,
            })
            .map_err(|e| ApiError::Internal(format!("serialize failed: {e}")))?;
            Response::builder()
                .status(StatusCode::OK)
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .header(SET_COOKIE, session)
                .header(SET_COOKIE, clear_verifier)
                .body(Body::from(body))
        }
    }
    .map_err(|e| ApiError::Internal(format!("response build failed: {e}")))?;
    Ok(response)
}

/// GET /logout - Revoke the session and bounce through the provider logout.
///
/// Revocation is best-effort: the cookies are cleared either way so the
/// browser ends up logged out locally.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE)
        && let Err(e) = state.identity.revoke_session(&token).await
    {
        tracing::warn!(error = %e, "session revocation failed, clearing cookies anyway");
    }

    let logout_uri = base_url(&state, &headers)?;
    let location = format!(
        "{}?client_id={}&logout_uri={}",
        state.config.identity.logout_endpoint(),
        state.config.identity.client_id,
        utf8_percent_encode(&logout_uri, PATH_SET),
    );

    let secure = state.config.server.secure_cookies;
    let response = Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .header(SET_COOKIE, expired_cookie(SESSION_COOKIE, secure))
        .header(SET_COOKIE, expired_cookie(VERIFIER_COOKIE, secure))
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(format!("response build failed: {e}")))?;
    Ok(response)
}

/// Response for the authenticated caller.
#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub user_id: String,
    pub email: Option<String>,
}

/// GET /v1/auth/whoami - Return the resolved identity.
pub async fn whoami(req: Request) -> ApiResult<Json<WhoamiResponse>> {
    let auth = require_auth(&req)?;
    Ok(Json(WhoamiResponse {
        user_id: auth.profile.subject.as_str().to_string(),
        email: auth.profile.email.clone(),
    }))
}
