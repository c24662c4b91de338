//! Link claim signing and verification.

use crate::error::{SignerError, SignerResult};
use crate::key::SigningKey;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The claims bound into a signed link.
///
/// The signature covers all four fields, so a holder cannot retarget the link
/// to another object, change the method, strip the identity binding, or
/// extend the expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkClaims<'a> {
    /// Object key the link grants access to.
    pub object: &'a str,
    /// HTTP method ("GET" or "PUT").
    pub method: &'a str,
    /// Identity the link was issued to.
    pub user: &'a str,
    /// Expiry as unix seconds.
    pub expires_unix: i64,
}

impl LinkClaims<'_> {
    /// Canonical byte string covered by the signature.
    ///
    /// Fields are newline-separated; none of them can contain a newline
    /// (object paths and user ids forbid whitespace/control characters).
    fn canonical(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.method, self.object, self.user, self.expires_unix
        )
    }
}

/// Signs and verifies link claims with an HMAC key.
pub struct LinkSigner {
    key: SigningKey,
}

impl LinkSigner {
    /// Create a new signer from a key.
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a signer with a random ephemeral key.
    pub fn generate(key_name: impl Into<String>) -> Self {
        Self::new(SigningKey::generate(key_name))
    }

    /// Get the key name.
    pub fn key_name(&self) -> &str {
        self.key.name()
    }

    /// Sign link claims, returning the base64url signature.
    pub fn sign(&self, claims: &LinkClaims<'_>) -> String {
        let mut mac = HmacSha256::new_from_slice(self.key.secret())
            .expect("HMAC accepts any key length");
        mac.update(claims.canonical().as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Verify a base64url signature over the claims.
    ///
    /// Comparison is constant-time (via `Mac::verify_slice`).
    pub fn verify(&self, claims: &LinkClaims<'_>, signature: &str) -> SignerResult<()> {
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| SignerError::InvalidSignature(format!("invalid base64url: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(self.key.secret())
            .expect("HMAC accepts any key length");
        mac.update(claims.canonical().as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| SignerError::VerificationFailed)
    }
}
