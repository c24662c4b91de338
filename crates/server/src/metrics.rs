//! Prometheus metrics for the Parcel server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping;
//! restrict it to scraper IPs at the infrastructure level. Metrics carry no
//! object paths or identities, only aggregate counts.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static DOWNLOAD_REQUESTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "parcel_download_requests_total",
        "Total number of download requests received",
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_ALLOWED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "parcel_downloads_allowed_total",
        "Total number of downloads granted a signed link",
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_DENIED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "parcel_downloads_denied_total",
            "Total number of download denials by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static LOGIN_REDIRECTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "parcel_login_redirects_total",
        "Total number of login challenges issued",
    )
    .expect("metric creation failed")
});

pub static SHARES_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "parcel_shares_created_total",
        "Total number of share grants recorded",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_LINKS_ISSUED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "parcel_upload_links_issued_total",
        "Total number of presigned upload URLs issued",
    )
    .expect("metric creation failed")
});

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        let registry = &*REGISTRY;
        registry
            .register(Box::new(DOWNLOAD_REQUESTS.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(DOWNLOADS_ALLOWED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(DOWNLOADS_DENIED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(LOGIN_REDIRECTS.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(SHARES_CREATED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(UPLOAD_LINKS_ISSUED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buffer,
    )
        .into_response()
}
