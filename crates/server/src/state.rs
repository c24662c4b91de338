//! Application state shared across handlers.

use parcel_core::config::AppConfig;
use parcel_identity::IdentityProvider;
use parcel_metadata::MetadataStore;
use parcel_signer::LinkSigner;
use parcel_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
///
/// Every external collaborator sits behind a trait object injected at
/// construction time, so tests can substitute fakes for the identity
/// provider, the metadata store, and the object store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Access-record store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Identity provider client.
    pub identity: Arc<dyn IdentityProvider>,
    /// Link signer for locally issued URLs.
    pub signer: Arc<LinkSigner>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This validates configuration and logs warnings for risky settings.
    ///
    /// # Panics
    ///
    /// Panics if configuration is invalid.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        identity: Arc<dyn IdentityProvider>,
        signer: Arc<LinkSigner>,
    ) -> Self {
        if let Err(error) = config.identity.validate() {
            panic!("Invalid identity configuration: {}", error);
        }
        match config.links.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid link configuration: {}", error);
            }
        }

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            identity,
            signer,
        }
    }

    /// The externally reachable base URL for this instance, from config.
    pub fn public_base_url(&self) -> Option<&str> {
        self.config
            .server
            .public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
    }
}
