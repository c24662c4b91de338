//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parcel_identity::IdentityError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(#[from] parcel_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] parcel_metadata::MetadataError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("signer error: {0}")]
    Signer(#[from] parcel_signer::SignerError),

    #[error("core error: {0}")]
    Core(#[from] parcel_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal_error",
            Self::Upstream(_) => "upstream_unavailable",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
            Self::Identity(_) => "identity_error",
            Self::Signer(_) => "invalid_link",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(e) => match e {
                parcel_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                // Signing/backend failures are an upstream failure class, not
                // an authorization denial.
                parcel_storage::StorageError::Signing(_) | parcel_storage::StorageError::S3(_) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                parcel_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Identity(e) => match e {
                IdentityError::InvalidGrant(_) => StatusCode::UNAUTHORIZED,
                IdentityError::Upstream(_) | IdentityError::Protocol(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Signer(e) => match e {
                parcel_signer::SignerError::VerificationFailed
                | parcel_signer::SignerError::InvalidSignature(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the message is safe to echo to the caller. Infrastructure
    /// errors get a generic body; their detail goes to the log only.
    fn public_message(&self) -> String {
        match self {
            Self::Storage(parcel_storage::StorageError::NotFound(key)) => {
                format!("object not found: {key}")
            }
            Self::Internal(_)
            | Self::Upstream(_)
            | Self::Storage(_)
            | Self::Metadata(_)
            | Self::Identity(IdentityError::Upstream(_) | IdentityError::Protocol(_)) => {
                "service unavailable, retry later".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_upstream_is_bad_gateway_not_unauthorized() {
        let err = ApiError::Identity(IdentityError::Upstream("connect refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn infrastructure_detail_is_not_echoed() {
        let err = ApiError::Metadata(parcel_metadata::MetadataError::Internal(
            "table access_records is on fire".to_string(),
        ));
        assert!(!err.public_message().contains("access_records"));
    }

    #[test]
    fn storage_not_found_maps_to_404() {
        let err = ApiError::Storage(parcel_storage::StorageError::NotFound("a.txt".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_link_signature_maps_to_403() {
        let err = ApiError::Signer(parcel_signer::SignerError::VerificationFailed);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
