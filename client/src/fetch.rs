//! Image fetch: connect, handshake, request, save

use crate::config::ClientConfig;
use anyhow::{Context, Result};
use pixelpost_transport::{connect, request_file, save_record, Initiator};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Upper bound on the delay between attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fetch the responder's image, retrying on fresh connections
///
/// A failed handshake is never retried on the same socket, so every attempt
/// opens a new connection.
pub async fn fetch_image(config: &ClientConfig) -> Result<PathBuf> {
    let mut backoff = config.connection.retry_backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match fetch_once(config).await {
            Ok(path) => return Ok(path),
            Err(e) if attempt <= config.connection.retries => {
                warn!(
                    "Attempt {} failed: {}; retrying in {:?}",
                    attempt, e, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "fetching from {} failed after {} attempt(s)",
                        config.connection.endpoint, attempt
                    )
                });
            }
        }
    }
}

/// One connect → handshake → request → save sequence
pub async fn fetch_once(config: &ClientConfig) -> pixelpost_transport::Result<PathBuf> {
    let mut channel = connect(
        config.connection.endpoint.as_str(),
        config.connection.connect_timeout(),
        config.framer_config(),
    )
    .await?;

    let span = info_span!("conn", id = %channel.id(), endpoint = %config.connection.endpoint);
    async move {
        Initiator::new().connect(&mut channel).await?;
        let record = request_file(&mut channel).await?;

        if let Err(e) = channel.shutdown().await {
            debug!("Shutdown: {}", e);
        }

        save_record(&config.output.dir, &record).await
    }
    .instrument(span)
    .await
}

pub fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}
