//! Link signing key management.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use rand::RngCore;

/// Secret length in bytes.
const SECRET_LEN: usize = 32;

/// A named HMAC signing key.
///
/// Serialized form is `{name}:{base64-secret}`, one line, suitable for a key
/// file or an environment variable. The name travels with signed URLs only
/// implicitly (via config), so rotating keys means re-issuing links.
#[derive(Clone)]
pub struct SigningKey {
    name: String,
    secret: [u8; SECRET_LEN],
}

impl SigningKey {
    /// Generate a new random key.
    pub fn generate(name: impl Into<String>) -> Self {
        let mut secret = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            name: name.into(),
            secret,
        }
    }

    /// Parse from the encoded `{name}:{base64}` form.
    pub fn from_encoded(s: &str) -> SignerResult<Self> {
        let (name, secret_b64) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SignerError::KeyParsing("expected '{name}:{base64}'".to_string()))?;
        if name.is_empty() {
            return Err(SignerError::KeyParsing("key name is empty".to_string()));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(secret_b64)
            .map_err(|e| SignerError::KeyParsing(format!("invalid base64: {e}")))?;
        let secret: [u8; SECRET_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SignerError::KeyParsing(format!(
                "expected {SECRET_LEN}-byte secret, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            secret,
        })
    }

    /// Get the encoded `{name}:{base64}` form.
    pub fn to_encoded(&self) -> String {
        format!(
            "{}:{}",
            self.name,
            base64::engine::general_purpose::STANDARD.encode(self.secret)
        )
    }

    /// Get the key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the raw secret bytes.
    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_round_trip() {
        let key = SigningKey::generate("links-1");
        let encoded = key.to_encoded();
        let parsed = SigningKey::from_encoded(&encoded).unwrap();
        assert_eq!(parsed.name(), "links-1");
        assert_eq!(parsed.secret(), key.secret());
    }

    #[test]
    fn from_encoded_rejects_malformed_input() {
        assert!(SigningKey::from_encoded("no-separator").is_err());
        assert!(SigningKey::from_encoded(":AAAA").is_err());
        assert!(SigningKey::from_encoded("name:not-base64!!").is_err());
        // Wrong secret length
        assert!(SigningKey::from_encoded("name:AAAA").is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let key = SigningKey::generate("links-1");
        let debug = format!("{key:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&key.to_encoded()));
    }
}
