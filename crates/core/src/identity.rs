//! User identity types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for user identifiers.
const MAX_USER_ID_LEN: usize = 128;

/// The stable subject identifier resolved from a caller's session credential.
///
/// This is the identity provider's opaque subject, never a raw token. The `#`
/// character is forbidden because record keys use it as a field separator.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse and validate a user identifier.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidUserId("user id is empty".to_string()));
        }
        if s.len() > MAX_USER_ID_LEN {
            return Err(Error::InvalidUserId(format!(
                "user id exceeds {MAX_USER_ID_LEN} bytes"
            )));
        }
        if s.contains('#') || s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidUserId(format!(
                "user id contains forbidden characters: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<UserId> for String {
    fn from(user: UserId) -> Self {
        user.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_subject_ids() {
        let user = UserId::parse("b5c1a7e0-4f2d-4c21-9f4e-8d1a2b3c4d5e").unwrap();
        assert_eq!(user.as_str(), "b5c1a7e0-4f2d-4c21-9f4e-8d1a2b3c4d5e");
    }

    #[test]
    fn parse_rejects_separator_and_whitespace() {
        assert!(UserId::parse("alice#bob").is_err());
        assert!(UserId::parse("alice bob").is_err());
        assert!(UserId::parse("").is_err());
    }
}
