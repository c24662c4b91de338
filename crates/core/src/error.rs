//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid object path: {0}")]
    InvalidObjectPath(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid record key: {0}")]
    InvalidRecordKey(String),

    #[error("invalid share kind: {0}")]
    InvalidShareKind(String),

    #[error("invalid quota: {0}")]
    InvalidQuota(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
