//! HTTP API server for the Parcel file-sharing service.
//!
//! This crate provides the request pipeline:
//! - Session authentication against the identity provider, with PKCE login
//!   redirects for browser callers
//! - The authorization and quota engine over access records
//! - Signed download-link issuance and grant recording
//! - Share and upload management endpoints
//! - Local fulfilment of filesystem-backend signed links

pub mod access;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
