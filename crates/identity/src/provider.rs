//! Identity provider contract.

use crate::error::IdentityResult;
use async_trait::async_trait;
use parcel_core::UserId;
use serde::Deserialize;

/// The resolved identity behind a session credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable opaque subject identifier.
    pub subject: UserId,
    /// Email claim, if the provider exposes one.
    pub email: Option<String>,
}

/// Tokens returned by the authorization-code exchange.
#[derive(Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_type: String,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Contract for the hosted identity provider.
///
/// Implementations are read-only against provider state except for
/// `revoke_session`. Invalid or expired credentials are distinguished
/// outcomes (`InvalidGrant` / `Ok(None)`), never conflated with provider
/// unavailability.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code and PKCE verifier for tokens.
    async fn exchange_auth_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> IdentityResult<TokenSet>;

    /// Resolve the subject bound to an access token.
    ///
    /// Returns `Ok(None)` for invalid or expired tokens; `Err(Upstream)` only
    /// when the provider cannot be consulted at all.
    async fn user_by_access_token(&self, token: &str) -> IdentityResult<Option<UserProfile>>;

    /// Revoke the session behind a token. Best-effort on logout.
    async fn revoke_session(&self, token: &str) -> IdentityResult<()>;
}
