//! Parcel command-line client.

mod api_client;

use anyhow::Result;
use api_client::{ApiClient, CreateShareRequest};
use clap::{Parser, Subcommand};

/// Command-line client for a Parcel server
#[derive(Parser, Debug)]
#[command(name = "parcel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "PARCEL_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Access token (from the identity provider)
    #[arg(long, env = "PARCEL_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the identity behind the configured token
    Whoami,
    /// Share an object with another user
    Share {
        /// Object path
        path: String,
        /// Recipient user id
        #[arg(long)]
        recipient: String,
        /// Download quota for the recipient
        #[arg(long, default_value_t = 1)]
        max_downloads: i64,
        /// Pre-mint a long-lived link for a recipient who never logs in
        #[arg(long)]
        external: bool,
    },
    /// List share grants for an owned object
    Shares {
        /// Object path
        path: String,
    },
    /// Request a presigned upload URL (records ownership)
    UploadUrl {
        /// Object path
        path: String,
    },
    /// Request a download link without following the redirect
    Download {
        /// Object path
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server, &cli.token)?;

    match cli.command {
        Command::Whoami => {
            let who = client.whoami().await?;
            println!("user: {}", who.user_id);
            if let Some(email) = who.email {
                println!("email: {email}");
            }
        }
        Command::Share {
            path,
            recipient,
            max_downloads,
            external,
        } => {
            let share = client
                .create_share(
                    &path,
                    CreateShareRequest {
                        recipient,
                        max_downloads,
                        kind: external.then(|| "external".to_string()),
                    },
                )
                .await?;
            println!(
                "shared {} with {} ({} downloads, {})",
                share.object_path, share.recipient, share.max_downloads, share.kind
            );
            println!("share link: {}", share.share_url);
        }
        Command::Shares { path } => {
            let listing = client.list_shares(&path).await?;
            if listing.shares.is_empty() {
                println!("{}: no shares", listing.object_path);
            }
            for share in listing.shares {
                println!(
                    "{}\t{}\tmax_downloads={}\tgranted {}",
                    share.recipient,
                    share.kind.as_deref().unwrap_or("internal"),
                    share
                        .max_downloads
                        .map_or_else(|| "?".to_string(), |m| m.to_string()),
                    share.granted_at
                );
            }
        }
        Command::UploadUrl { path } => {
            let upload = client.upload_url(&path).await?;
            println!("{}", upload.url);
            eprintln!("expires: {}", upload.expires_at);
        }
        Command::Download { path } => {
            let link = client.download_link(&path).await?;
            println!("{link}");
        }
    }

    Ok(())
}
