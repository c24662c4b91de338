//! Integration tests for the authentication flow: login redirects, the PKCE
//! callback, logout, and provider-outage behavior.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use common::fixtures::{get, location, set_cookies};
use url::Url;

#[tokio::test]
async fn unauthenticated_download_redirects_to_login() {
    let server = TestServer::new().await;

    let (status, headers, _) = get(&server.router, "/download/report.csv", None).await;

    assert_eq!(status, StatusCode::FOUND);

    let auth_url = Url::parse(&location(&headers)).unwrap();
    assert!(auth_url.as_str().starts_with("https://auth.parcel.test/oauth2/authorize"));

    let pairs: std::collections::HashMap<_, _> = auth_url.query_pairs().collect();
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["client_id"], "test-client");
    assert_eq!(pairs["code_challenge_method"], "S256");
    assert!(!pairs["code_challenge"].is_empty());
    // The requested path rides in state so the callback can resume it.
    assert_eq!(pairs["state"], "report.csv");
    assert_eq!(
        pairs["redirect_uri"],
        "http://127.0.0.1:8080/auth/callback"
    );

    // The PKCE verifier is handed back via a short-lived cookie.
    let cookies = set_cookies(&headers);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("code_verifier=") && c.contains("HttpOnly"))
    );
}

#[tokio::test]
async fn login_endpoint_redirects_without_state() {
    let server = TestServer::new().await;

    let (status, headers, _) = get(&server.router, "/login", None).await;

    assert_eq!(status, StatusCode::FOUND);
    let auth_url = Url::parse(&location(&headers)).unwrap();
    let pairs: std::collections::HashMap<_, _> = auth_url.query_pairs().collect();
    assert!(!pairs.contains_key("state"));
}

#[tokio::test]
async fn invalid_session_token_still_redirects_to_login() {
    let server = TestServer::new().await;

    // Cookie present but the provider does not know the token: this is the
    // "please log in" path, not an error.
    let (status, headers, _) = get(
        &server.router,
        "/download/report.csv",
        Some("access_token=expired-token"),
    )
    .await;

    assert_eq!(status, StatusCode::FOUND);
    assert!(location(&headers).contains("code_challenge"));
}

#[tokio::test]
async fn provider_outage_is_an_error_not_a_login_redirect() {
    let server = TestServer::new().await;
    let cookie = server.login("alice");
    server.identity.set_unavailable(true);

    let (status, headers, _) =
        get(&server.router, "/download/report.csv", Some(&cookie)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(headers.get("location").is_none());
}

#[tokio::test]
async fn callback_without_code_is_rejected() {
    let server = TestServer::new().await;

    let (status, _, _) = get(
        &server.router,
        "/auth/callback",
        Some("code_verifier=some-verifier"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_without_verifier_cookie_is_rejected() {
    let server = TestServer::new().await;

    let (status, _, _) = get(&server.router, "/auth/callback?code=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_with_unknown_code_is_unauthorized() {
    let server = TestServer::new().await;

    let (status, _, _) = get(
        &server.router,
        "/auth/callback?code=bogus",
        Some("code_verifier=some-verifier"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn callback_sets_session_and_resumes_download() {
    let server = TestServer::new().await;
    server.identity.register_token("fresh-token", "alice");
    server.identity.register_code("good-code", "fresh-token");

    let (status, headers, _) = get(
        &server.router,
        "/auth/callback?code=good-code&state=reports/q2.csv",
        Some("code_verifier=some-verifier"),
    )
    .await;

    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        location(&headers),
        "http://127.0.0.1:8080/download/reports/q2.csv"
    );

    let cookies = set_cookies(&headers);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=fresh-token")));
    // The verifier cookie is cleared once the exchange is done.
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("code_verifier=;") && c.contains("Expires=Thu, 01 Jan 1970"))
    );
}

#[tokio::test]
async fn callback_without_state_returns_token_metadata() {
    let server = TestServer::new().await;
    server.identity.register_token("fresh-token", "alice");
    server.identity.register_code("good-code", "fresh-token");

    let (status, headers, body) = get(
        &server.router,
        "/auth/callback?code=good-code",
        Some("code_verifier=some-verifier"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    // Tokens travel in cookies, never in the body.
    assert!(body.get("access_token").is_none());
    assert!(set_cookies(&headers).iter().any(|c| c.starts_with("access_token=")));
}

#[tokio::test]
async fn whoami_requires_auth() {
    let server = TestServer::new().await;

    let (status, _, _) = get(&server.router, "/v1/auth/whoami", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = server.login("alice");
    let (status, _, body) = get(&server.router, "/v1/auth/whoami", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["email"], "alice@example.test");
}

#[tokio::test]
async fn logout_revokes_and_clears_cookies() {
    let server = TestServer::new().await;
    let cookie = server.login("alice");

    let (status, headers, _) = get(&server.router, "/logout", Some(&cookie)).await;

    assert_eq!(status, StatusCode::FOUND);
    assert!(location(&headers).starts_with("https://auth.parcel.test/logout?client_id=test-client"));
    assert_eq!(server.identity.revocations(), 1);

    let cookies = set_cookies(&headers);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=;")));
    assert!(cookies.iter().any(|c| c.starts_with("code_verifier=;")));
}

#[tokio::test]
async fn health_check_is_unauthenticated() {
    let server = TestServer::new().await;

    let (status, _, body) = get(&server.router, "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
