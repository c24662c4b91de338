//! Access record keys and their encoding.
//!
//! Every access-control fact is one record keyed by `(object_path, record_key)`
//! where the record key encodes the user and the record type:
//!
//! ```text
//! {user}#OWNER                      ownership, unconditional access
//! {user}#SHARE                      share grant with a download quota
//! {user}#DOWNLOAD#{rfc3339}         one granted download, append-only
//! ```
//!
//! The `#` separator is reserved: neither object paths nor user ids may
//! contain it, so prefix queries on `{user}#` are unambiguous.

use crate::error::{Error, Result};
use crate::identity::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Record type discriminator within a record key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// Created when a user uploads an object. Grants unlimited access.
    Owner,
    /// Created when an owner grants another user bounded access.
    Share,
    /// Appended once per granted download. Never mutated.
    Download,
}

impl RecordType {
    /// Parse from the key segment.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "OWNER" => Ok(Self::Owner),
            "SHARE" => Ok(Self::Share),
            "DOWNLOAD" => Ok(Self::Download),
            _ => Err(Error::InvalidRecordKey(format!("unknown record type: {s}"))),
        }
    }

    /// Get the key segment representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Share => "SHARE",
            Self::Download => "DOWNLOAD",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a share grant is consumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    /// Recipient authenticates with the identity provider and gets fresh links.
    #[default]
    Internal,
    /// Recipient never authenticates; the link is pre-minted at share time
    /// and stored on the share record.
    External,
}

impl ShareKind {
    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            _ => Err(Error::InvalidShareKind(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded record key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordKey {
    /// The user the record concerns (owner, recipient, or downloader).
    pub user: UserId,
    /// Record type discriminator.
    pub record_type: RecordType,
    /// Timestamp suffix, present only on DOWNLOAD keys.
    pub timestamp: Option<OffsetDateTime>,
}

impl RecordKey {
    /// Encode an OWNER key: `{user}#OWNER`.
    pub fn owner(user: &UserId) -> String {
        format!("{}#{}", user, RecordType::Owner)
    }

    /// Encode a SHARE key: `{user}#SHARE`.
    pub fn share(user: &UserId) -> String {
        format!("{}#{}", user, RecordType::Share)
    }

    /// Encode a DOWNLOAD key: `{user}#DOWNLOAD#{rfc3339}`.
    ///
    /// The timestamp keeps download records append-only: each granted
    /// download gets a distinct key.
    pub fn download(user: &UserId, at: OffsetDateTime) -> String {
        // Rfc3339 formatting only fails for years outside 0..=9999.
        let ts = at
            .format(&Rfc3339)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        format!("{}#{}#{ts}", user, RecordType::Download)
    }

    /// Prefix matching every record for a user: `{user}#`.
    pub fn user_prefix(user: &UserId) -> String {
        format!("{user}#")
    }

    /// Prefix matching a user's download records: `{user}#DOWNLOAD#`.
    pub fn download_prefix(user: &UserId) -> String {
        format!("{}#{}#", user, RecordType::Download)
    }

    /// Decode a record key.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '#');
        let user = parts
            .next()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidRecordKey(format!("missing user segment: {s}")))?;
        let user = UserId::parse(user)?;
        let record_type = RecordType::parse(
            parts
                .next()
                .ok_or_else(|| Error::InvalidRecordKey(format!("missing type segment: {s}")))?,
        )?;

        let timestamp = match (record_type, parts.next()) {
            (RecordType::Download, Some(ts)) => Some(
                OffsetDateTime::parse(ts, &Rfc3339)
                    .map_err(|e| Error::InvalidRecordKey(format!("bad timestamp in {s}: {e}")))?,
            ),
            (RecordType::Download, None) => {
                return Err(Error::InvalidRecordKey(format!(
                    "download key missing timestamp: {s}"
                )));
            }
            (_, Some(extra)) => {
                return Err(Error::InvalidRecordKey(format!(
                    "unexpected trailing segment '{extra}' in {s}"
                )));
            }
            (_, None) => None,
        };

        Ok(Self {
            user,
            record_type,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn owner_and_share_keys() {
        assert_eq!(RecordKey::owner(&user("alice")), "alice#OWNER");
        assert_eq!(RecordKey::share(&user("bob")), "bob#SHARE");
    }

    #[test]
    fn download_key_carries_timestamp() {
        let at = datetime!(2026-08-05 12:30:00 UTC);
        let key = RecordKey::download(&user("bob"), at);
        assert_eq!(key, "bob#DOWNLOAD#2026-08-05T12:30:00Z");
    }

    #[test]
    fn prefixes() {
        assert_eq!(RecordKey::user_prefix(&user("bob")), "bob#");
        assert_eq!(RecordKey::download_prefix(&user("bob")), "bob#DOWNLOAD#");
    }

    #[test]
    fn parse_round_trips() {
        let key = RecordKey::parse("alice#OWNER").unwrap();
        assert_eq!(key.user.as_str(), "alice");
        assert_eq!(key.record_type, RecordType::Owner);
        assert!(key.timestamp.is_none());

        let key = RecordKey::parse("bob#DOWNLOAD#2026-08-05T12:30:00Z").unwrap();
        assert_eq!(key.record_type, RecordType::Download);
        assert_eq!(key.timestamp, Some(datetime!(2026-08-05 12:30:00 UTC)));
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert!(RecordKey::parse("alice").is_err());
        assert!(RecordKey::parse("alice#GRANT").is_err());
        assert!(RecordKey::parse("alice#DOWNLOAD").is_err());
        assert!(RecordKey::parse("alice#OWNER#extra").is_err());
        assert!(RecordKey::parse("#OWNER").is_err());
    }

    #[test]
    fn share_kind_parse() {
        assert_eq!(ShareKind::parse("internal").unwrap(), ShareKind::Internal);
        assert_eq!(ShareKind::parse("external").unwrap(), ShareKind::External);
        assert!(ShareKind::parse("public").is_err());
    }
}
