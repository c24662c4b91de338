//! Identity provider error types.

use thiserror::Error;

/// Identity provider operation errors.
///
/// `InvalidGrant` is the distinguished "unauthenticated" outcome for the code
/// exchange; `Upstream` means the provider itself was unreachable or broken
/// and must never be treated as "not logged in".
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("authorization code rejected: {0}")]
    InvalidGrant(String),

    #[error("identity provider unavailable: {0}")]
    Upstream(String),

    #[error("identity provider protocol error: {0}")]
    Protocol(String),
}

/// Result type for identity operations.
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;
