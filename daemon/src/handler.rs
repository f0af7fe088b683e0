//! Connection handler

use crate::config::DaemonConfig;
use anyhow::Result;
use pixelpost_transport::{ChannelListener, FileTransferService, Responder, SecureChannel};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Run the responder until interrupted
pub async fn run_handler(config: &DaemonConfig) -> Result<()> {
    let listener = ChannelListener::bind(config.server.bind, config.framer_config()).await?;

    tokio::select! {
        result = accept_loop(listener, config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

/// Accept connections and spawn one task per connection
///
/// A permit is taken before each accept, so at most `max_connections` sockets
/// are open at once; further peers wait in the listen backlog.
pub async fn accept_loop(listener: ChannelListener, config: &DaemonConfig) -> Result<()> {
    let limiter = Arc::new(Semaphore::new(config.server.max_connections));
    let responder = Responder::new(config.handshake_config());
    let service = Arc::new(FileTransferService::new(&config.files.image_path));

    loop {
        let permit = limiter.clone().acquire_owned().await?;

        let (channel, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };

        let span = info_span!("conn", id = %channel.id(), %peer);
        let responder = responder.clone();
        let service = service.clone();

        tokio::spawn(
            async move {
                handle_connection(channel, peer, &responder, &service).await;
                drop(permit);
            }
            .instrument(span),
        );
    }
}

async fn handle_connection(
    mut channel: SecureChannel<TcpStream>,
    peer: SocketAddr,
    responder: &Responder,
    service: &FileTransferService,
) {
    let started = Instant::now();
    info!("Connection opened from {}", peer);

    if let Err(e) = responder.accept(&mut channel).await {
        warn!("Handshake with {} failed: {}", peer, e);
        return;
    }

    match service.serve(&mut channel).await {
        Ok(served) => debug!("Served {} file(s)", served),
        Err(e) => warn!("Connection error: {}", e),
    }

    if let Err(e) = channel.shutdown().await {
        debug!("Shutdown: {}", e);
    }

    info!(
        "Connection closed after {:?} ({} bytes in, {} bytes out)",
        started.elapsed(),
        channel.bytes_received(),
        channel.bytes_sent()
    );
}
