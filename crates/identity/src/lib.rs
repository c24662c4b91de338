//! Identity provider client for Parcel.
//!
//! This crate provides:
//! - The `IdentityProvider` contract (code exchange, token introspection,
//!   session revocation)
//! - An OAuth2 authorization-code + PKCE client for hosted providers
//! - PKCE verifier/challenge generation (RFC 7636)
//! - Login challenge construction (authorization URL + verifier)

pub mod error;
pub mod login;
pub mod oidc;
pub mod pkce;
pub mod provider;

pub use error::{IdentityError, IdentityResult};
pub use login::LoginChallenge;
pub use oidc::OidcProvider;
pub use pkce::PkcePair;
pub use provider::{IdentityProvider, TokenSet, UserProfile};
