//! Session authentication middleware and cookie handling.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE, HOST};
use axum::middleware::Next;
use axum::response::Response;
use parcel_identity::{IdentityProvider, UserProfile};
use tracing::Instrument;
use uuid::Uuid;

/// Cookie carrying the identity provider access token.
pub const SESSION_COOKIE: &str = "access_token";

/// Cookie carrying the PKCE code verifier between the login redirect and the
/// auth callback.
pub const VERIFIER_COOKIE: &str = "code_verifier";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and filtered to
    /// printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    /// The resolved identity.
    pub profile: UserProfile,
}

impl AuthenticatedUser {
    /// The stable subject identifier.
    pub fn user(&self) -> &parcel_core::UserId {
        &self.profile.subject
    }
}

/// Extract a named cookie value from the Cookie header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|cookie| {
        let (key, value) = cookie.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Extract bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Build a session cookie holding the access token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict{secure}")
}

/// Build the short-lived PKCE verifier cookie.
/// SameSite=Lax so it survives the cross-site redirect back from the provider.
pub fn verifier_cookie(verifier: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{VERIFIER_COOKIE}={verifier}; Path=/; HttpOnly; SameSite=Lax{secure}")
}

/// Build an expired cookie that clears `name`.
pub fn expired_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT{secure}")
}

/// The OAuth callback URL for this service instance.
///
/// Uses the configured public base URL when set, otherwise derives it from
/// the request's Host header.
pub fn callback_url(state: &AppState, headers: &HeaderMap) -> ApiResult<String> {
    Ok(format!("{}/auth/callback", base_url(state, headers)?))
}

/// The externally reachable base URL for this instance.
pub fn base_url(state: &AppState, headers: &HeaderMap) -> ApiResult<String> {
    if let Some(base) = state.public_base_url() {
        return Ok(base.to_string());
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing Host header".to_string()))?;
    Ok(format!("https://{host}"))
}

/// Session middleware: resolves the caller's credential (bearer header or
/// session cookie) against the identity provider and sets up trace context.
///
/// An absent or invalid credential leaves the request unauthenticated —
/// handlers decide between the login redirect (browser routes) and 401 (API
/// routes). A provider outage is a hard error here: it must never be
/// mistaken for "not logged in".
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let credential = bearer_token(req.headers())
        .map(str::to_string)
        .or_else(|| cookie_value(req.headers(), SESSION_COOKIE));

    if let Some(credential) = credential
        && let Some(profile) = state.identity.user_by_access_token(&credential).await?
    {
        tracing::debug!(user = %profile.subject, "session resolved");
        req.extensions_mut().insert(AuthenticatedUser { profile });
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require authentication (session must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

/// Get optional authentication.
pub fn get_auth(req: &Request) -> Option<&AuthenticatedUser> {
    req.extensions().get::<AuthenticatedUser>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let headers = headers_with_cookie("a=1; access_token=tok-123; b=2");
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("tok-123")
        );
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn cookie_value_does_not_match_prefixes() {
        let headers = headers_with_cookie("access_token_old=x; access_token=y");
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("y"));
    }

    #[test]
    fn bearer_token_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("BEARER tok"));
        assert_eq!(bearer_token(&headers), Some("tok"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic tok"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn trace_id_sanitizes_client_input() {
        let trace = TraceId::from_client("abc\ndef");
        assert_eq!(trace.as_str(), "abcdef");

        let trace = TraceId::from_client("");
        assert!(!trace.as_str().is_empty());

        let long = "x".repeat(500);
        assert_eq!(TraceId::from_client(&long).as_str().len(), 128);
    }

    #[test]
    fn cookies_carry_expected_attributes() {
        let cookie = session_cookie("tok", true);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));

        let cookie = verifier_cookie("ver", false);
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));

        let cookie = expired_cookie(VERIFIER_COOKIE, false);
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
    }
}
