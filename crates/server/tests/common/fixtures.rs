//! Request helpers shared across integration tests.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

/// Send a request through the router and collect status, headers, and a JSON
/// body (Null when the body is empty or not JSON).
#[allow(dead_code)]
pub async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", cookie);
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, headers, json)
}

/// Shorthand for a GET with an optional Cookie header.
#[allow(dead_code)]
pub async fn get(
    router: &axum::Router,
    uri: &str,
    cookie: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    request(router, "GET", uri, cookie, None).await
}

/// The Location header as a string.
#[allow(dead_code)]
pub fn location(headers: &HeaderMap) -> String {
    headers
        .get("location")
        .expect("expected a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// All Set-Cookie header values.
#[allow(dead_code)]
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
