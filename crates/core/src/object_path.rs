//! Object path identifiers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for object paths.
/// S3 caps keys at 1024 bytes; we apply the same ceiling everywhere.
const MAX_PATH_LEN: usize = 1024;

/// The stable identifier of a storable object (a file key in the object store).
///
/// Paths are relative, slash-separated, and never contain `..` components or
/// the `#` character (reserved as the record-key separator).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate an object path.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidObjectPath("path is empty".to_string()));
        }
        if s.len() > MAX_PATH_LEN {
            return Err(Error::InvalidObjectPath(format!(
                "path exceeds {MAX_PATH_LEN} bytes"
            )));
        }
        if s.starts_with('/') || s.ends_with('/') {
            return Err(Error::InvalidObjectPath(format!(
                "path must be relative without trailing slash: {s}"
            )));
        }
        if s.contains('#') {
            return Err(Error::InvalidObjectPath(format!(
                "path must not contain '#': {s}"
            )));
        }
        // Reject traversal and empty components outright; the storage layer
        // re-validates, but access records must never be keyed on them.
        for component in s.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(Error::InvalidObjectPath(format!(
                    "path contains unsafe component: {s}"
                )));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({})", self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_nested_paths() {
        let path = ObjectPath::parse("reports/2026/q2/report.csv").unwrap();
        assert_eq!(path.as_str(), "reports/2026/q2/report.csv");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(ObjectPath::parse("").is_err());
    }

    #[test]
    fn parse_rejects_absolute_and_trailing() {
        assert!(ObjectPath::parse("/etc/passwd").is_err());
        assert!(ObjectPath::parse("reports/").is_err());
    }

    #[test]
    fn parse_rejects_traversal() {
        assert!(ObjectPath::parse("../secret").is_err());
        assert!(ObjectPath::parse("a/../b").is_err());
        assert!(ObjectPath::parse("a//b").is_err());
    }

    #[test]
    fn parse_rejects_record_separator() {
        assert!(ObjectPath::parse("file#name").is_err());
    }

    #[test]
    fn serde_round_trip() {
        let path = ObjectPath::parse("report.csv").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"report.csv\"");
        let back: ObjectPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn serde_rejects_invalid() {
        assert!(serde_json::from_str::<ObjectPath>("\"../x\"").is_err());
    }
}
