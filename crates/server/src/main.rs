//! Parcel server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use parcel_core::config::{AppConfig, LinkKeyConfig};
use parcel_identity::OidcProvider;
use parcel_server::{AppState, create_router};
use parcel_signer::{LinkSigner, SigningKey};
use parcel_storage::ObjectStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parcel - a file sharing and download-link service
#[derive(Parser, Debug)]
#[command(name = "parceld")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PARCEL_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Parcel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("PARCEL_") && key != "PARCEL_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: parceld --config /path/to/config.toml\n  \
             2. Environment variables: PARCEL_IDENTITY__BASE_URL=https://auth.example.com \
             PARCEL_IDENTITY__CLIENT_ID=your-client-id parceld\n\n\
             Set PARCEL_CONFIG to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("PARCEL_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    parcel_server::metrics::register_metrics();

    // Load the link signing key
    let signer = Arc::new(load_signer(&config.links.signing_key)?);

    // The filesystem backend mints links against this base URL; fall back to
    // the bind address for development setups without a public URL.
    let public_base_url = config
        .server
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}", config.server.bind));

    // Initialize storage backend
    let storage = parcel_storage::from_config(&config.storage, signer.clone(), &public_base_url)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Initialize metadata store
    let metadata = parcel_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    // Identity provider client
    let identity = Arc::new(OidcProvider::new(config.identity.clone()));

    // Create application state and router
    let state = AppState::new(config.clone(), storage, metadata, identity, signer);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load the link signing key from configuration.
fn load_signer(config: &LinkKeyConfig) -> Result<LinkSigner> {
    match config {
        LinkKeyConfig::File { path } => {
            let key_data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read key file: {}", path.display()))?;
            let key =
                SigningKey::from_encoded(key_data.trim()).context("failed to parse link key")?;
            tracing::info!("Loaded link signing key: {}", key.name());
            Ok(LinkSigner::new(key))
        }
        LinkKeyConfig::Env { var } => {
            let key_data =
                std::env::var(var).with_context(|| format!("link key env var not set: {var}"))?;
            let key =
                SigningKey::from_encoded(key_data.trim()).context("failed to parse link key")?;
            tracing::info!("Loaded link signing key from env: {}", key.name());
            Ok(LinkSigner::new(key))
        }
        LinkKeyConfig::Value { key } => {
            tracing::warn!("Using inline link signing key (not recommended for production)");
            let key = SigningKey::from_encoded(key.trim()).context("failed to parse link key")?;
            tracing::info!("Loaded link signing key: {}", key.name());
            Ok(LinkSigner::new(key))
        }
        LinkKeyConfig::Generate => {
            tracing::warn!(
                "Generating ephemeral link signing key; previously issued links are now invalid"
            );
            Ok(LinkSigner::generate("parcel-links"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_signer_from_file() {
        let key = SigningKey::generate("links-file");
        let temp = tempdir().unwrap();
        let key_path = temp.path().join("link.key");
        std::fs::write(&key_path, key.to_encoded()).unwrap();

        let loaded = load_signer(&LinkKeyConfig::File { path: key_path }).unwrap();
        assert_eq!(loaded.key_name(), "links-file");
    }

    #[test]
    fn load_signer_from_value() {
        let key = SigningKey::generate("links-inline");
        let loaded = load_signer(&LinkKeyConfig::Value {
            key: key.to_encoded(),
        })
        .unwrap();
        assert_eq!(loaded.key_name(), "links-inline");
    }

    #[test]
    fn load_signer_generate() {
        let loaded = load_signer(&LinkKeyConfig::Generate).unwrap();
        assert_eq!(loaded.key_name(), "parcel-links");
    }

    #[test]
    fn load_signer_rejects_garbage_file() {
        let temp = tempdir().unwrap();
        let key_path = temp.path().join("link.key");
        std::fs::write(&key_path, "not a key").unwrap();

        assert!(load_signer(&LinkKeyConfig::File { path: key_path }).is_err());
    }
}
