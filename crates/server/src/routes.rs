//! Route configuration.

use crate::auth::session_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Browser flow: login redirects, OAuth callback, the download pipeline,
    // and local fulfilment of filesystem-backend signed links.
    let browser_routes = Router::new()
        .route("/login", get(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/auth/callback", get(handlers::auth_callback))
        .route("/download/{*path}", get(handlers::download))
        .route("/object/{*path}", get(handlers::serve_object));

    // API flow: cookie/bearer authenticated, 401 instead of redirects.
    let api_routes = Router::new()
        .route("/v1/auth/whoami", get(handlers::whoami))
        // Health check (intentionally unauthenticated for load balancer probes)
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/shares/{*path}",
            axum::routing::post(handlers::create_share).get(handlers::list_shares),
        )
        .route(
            "/v1/uploads/{*path}",
            axum::routing::post(handlers::create_upload_url),
        );

    let mut router = Router::new().merge(browser_routes).merge(api_routes);

    // SECURITY: when enabled, restrict /metrics to authorized scraper IPs at
    // the network level. See crate::metrics module documentation.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> session resolution -> handler.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
