//! PixelPost Client
//!
//! Connects to a daemon, runs the handshake and downloads its image.

use anyhow::Result;
use clap::Parser;
use pixelpost_client::{fetch_image, ClientConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// PixelPost Client - fetches an image over an encrypted channel
#[derive(Parser, Debug)]
#[command(name = "pixelpost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "client.toml")]
    config: String,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Override the daemon address (host:port)
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("PixelPost Client v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::load_or_default(&args.config).await?;
    if let Some(endpoint) = args.endpoint {
        config.connection.endpoint = endpoint;
    }
    if let Some(output) = args.output {
        config.output.dir = output;
    }
    config.validate()?;

    info!("Fetching image from {}", config.connection.endpoint);
    let saved = fetch_image(&config).await?;
    info!("Saved image to {}", saved.display());

    Ok(())
}
