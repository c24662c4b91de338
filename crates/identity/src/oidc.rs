//! OAuth2/OIDC identity provider client.

use crate::error::{IdentityError, IdentityResult};
use crate::provider::{IdentityProvider, TokenSet, UserProfile};
use async_trait::async_trait;
use parcel_core::UserId;
use parcel_core::config::IdentityConfig;
use serde::Deserialize;

/// Userinfo response shape (OIDC standard claims).
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// HTTP client for a hosted OAuth2/OIDC identity provider.
///
/// Endpoints are derived from `identity.base_url` the way Cognito-style
/// hosted providers lay them out (`/oauth2/token`, `/oauth2/userInfo`, …).
pub struct OidcProvider {
    http: reqwest::Client,
    config: IdentityConfig,
}

impl OidcProvider {
    /// Create a new provider client.
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn upstream(context: &str, err: reqwest::Error) -> IdentityError {
        IdentityError::Upstream(format!("{context}: {err}"))
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn exchange_auth_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> IdentityResult<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
            ("code", code),
        ];

        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| Self::upstream("token endpoint", e))?;

        let status = response.status();
        if status.is_client_error() {
            // Invalid/expired/replayed code or verifier mismatch. The body is
            // provider-specific; log it, don't parse it.
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "code exchange rejected");
            return Err(IdentityError::InvalidGrant(format!(
                "token endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!(
                "token endpoint returned {status}"
            )));
        }

        response
            .json::<TokenSet>()
            .await
            .map_err(|e| IdentityError::Protocol(format!("bad token response: {e}")))
    }

    async fn user_by_access_token(&self, token: &str) -> IdentityResult<Option<UserProfile>> {
        let response = self
            .http
            .get(self.config.userinfo_endpoint())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Self::upstream("userinfo endpoint", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            // Invalid or expired token: a distinguished outcome, not an error.
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        let info = response
            .json::<UserInfoResponse>()
            .await
            .map_err(|e| IdentityError::Protocol(format!("bad userinfo response: {e}")))?;

        let subject = UserId::parse(&info.sub)
            .map_err(|e| IdentityError::Protocol(format!("bad subject claim: {e}")))?;

        Ok(Some(UserProfile {
            subject,
            email: info.email,
        }))
    }

    async fn revoke_session(&self, token: &str) -> IdentityResult<()> {
        let params = [
            ("token", token),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .http
            .post(self.config.revoke_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| Self::upstream("revoke endpoint", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!(
                "revoke endpoint returned {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinfo_parses_standard_claims() {
        let info: UserInfoResponse =
            serde_json::from_str(r#"{"sub":"user-123","email":"a@example.com"}"#).unwrap();
        assert_eq!(info.sub, "user-123");
        assert_eq!(info.email.as_deref(), Some("a@example.com"));

        let info: UserInfoResponse = serde_json::from_str(r#"{"sub":"user-123"}"#).unwrap();
        assert!(info.email.is_none());
    }
}
