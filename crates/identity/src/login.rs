//! Login challenge construction.

use crate::error::{IdentityError, IdentityResult};
use crate::pkce::PkcePair;
use parcel_core::config::IdentityConfig;
use url::Url;

/// A ready-to-send login redirect: the provider authorization URL and the
/// PKCE verifier the callback will need to complete the exchange.
#[derive(Clone, Debug)]
pub struct LoginChallenge {
    /// Full authorization URL including the code challenge.
    pub auth_url: String,
    /// The code verifier to stash in a short-lived cookie.
    pub verifier: String,
}

impl LoginChallenge {
    /// Build a login challenge for the given callback URL.
    ///
    /// `state` carries the originally requested object path so the callback
    /// can resume the request after login; it is opaque to the provider.
    pub fn new(
        config: &IdentityConfig,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> IdentityResult<Self> {
        let pkce = PkcePair::generate();

        let mut url = Url::parse(&config.authorize_endpoint())
            .map_err(|e| IdentityError::Protocol(format!("bad authorize endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &config.scope)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }

        Ok(Self {
            auth_url: url.into(),
            verifier: pkce.verifier,
        })
    }
}
