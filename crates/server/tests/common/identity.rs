//! Fake identity provider for tests.

use async_trait::async_trait;
use parcel_core::UserId;
use parcel_identity::{IdentityError, IdentityProvider, IdentityResult, TokenSet, UserProfile};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory identity provider: tokens and auth codes are registered by the
/// test, and the provider can be flipped into an "unavailable" mode to
/// exercise the upstream-failure path.
#[derive(Default)]
pub struct FakeIdentityProvider {
    /// access token -> profile
    users: Mutex<HashMap<String, UserProfile>>,
    /// auth code -> access token
    codes: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
    revocations: AtomicUsize,
}

#[allow(dead_code)]
impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a valid access token for a user; returns the token.
    pub fn register_token(&self, token: &str, user_id: &str) {
        let profile = UserProfile {
            subject: UserId::parse(user_id).expect("valid test user id"),
            email: Some(format!("{user_id}@example.test")),
        };
        self.users
            .lock()
            .unwrap()
            .insert(token.to_string(), profile);
    }

    /// Register an auth code that exchanges into `token`.
    pub fn register_code(&self, code: &str, token: &str) {
        self.codes
            .lock()
            .unwrap()
            .insert(code.to_string(), token.to_string());
    }

    /// Simulate a provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// How many sessions were revoked.
    pub fn revocations(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> IdentityResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(IdentityError::Upstream(
                "fake provider offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange_auth_code(
        &self,
        code: &str,
        _verifier: &str,
        _redirect_uri: &str,
    ) -> IdentityResult<TokenSet> {
        self.check_available()?;
        let token = self
            .codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidGrant("unknown code".to_string()))?;
        Ok(TokenSet {
            access_token: token,
            id_token: None,
            refresh_token: None,
            expires_in: 3600,
            token_type: "Bearer".to_string(),
        })
    }

    async fn user_by_access_token(&self, token: &str) -> IdentityResult<Option<UserProfile>> {
        self.check_available()?;
        Ok(self.users.lock().unwrap().get(token).cloned())
    }

    async fn revoke_session(&self, token: &str) -> IdentityResult<()> {
        self.check_available()?;
        self.users.lock().unwrap().remove(token);
        self.revocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
