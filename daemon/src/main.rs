//! PixelPost Daemon
//!
//! The responder: accepts connections, runs the RSA-OAEP handshake on each
//! and serves the configured image over the secure channel.

mod config;
mod handler;

#[cfg(test)]
mod config_tests;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::DaemonConfig;

/// PixelPost Daemon - serves an image over an encrypted channel
#[derive(Parser, Debug)]
#[command(name = "pixelpostd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "daemon.toml")]
    config: String,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Override the bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the served image
    #[arg(long)]
    image: Option<PathBuf>,
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

    info!("PixelPost Daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = DaemonConfig::load_or_default(&args.config).await?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(image) = args.image {
        config.files.image_path = image;
    }
    config.validate()?;

    if !tokio::fs::try_exists(&config.files.image_path)
        .await
        .unwrap_or(false)
    {
        warn!(
            "Image {} does not exist yet; requests will be refused",
            config.files.image_path.display()
        );
    }

    info!(
        "Serving {} on {} ({} bit RSA, up to {} connections)",
        config.files.image_path.display(),
        config.server.bind,
        config.security.rsa_bits,
        config.server.max_connections
    );

    handler::run_handler(&config).await
}
