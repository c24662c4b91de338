//! Core domain types and shared logic for the Parcel file-sharing service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Object paths identifying stored files
//! - User identities resolved from session credentials
//! - Access record keys (owner / share / download) and their encoding
//! - Share grants and download quotas
//! - Application configuration

pub mod config;
pub mod error;
pub mod identity;
pub mod object_path;
pub mod record;

pub use error::{Error, Result};
pub use identity::UserId;
pub use object_path::ObjectPath;
pub use record::{RecordKey, RecordType, ShareKind};
