//! Signed download-link issuance for Parcel.
//!
//! This crate provides:
//! - HMAC signing-key generation and loading
//! - Link claim signing (object, method, identity, expiry)
//! - Constant-time signature verification

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::SigningKey;
pub use signer::{LinkClaims, LinkSigner};
