//! TCP accept/connect helpers producing fresh secure channels

use crate::channel::SecureChannel;
use crate::error::{ChannelError, Result};
use crate::framer::FramerConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::{debug, info};

/// Default deadline for establishing an outbound connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts TCP connections and hands each out as an unsecured channel
pub struct ChannelListener {
    listener: TcpListener,
    config: FramerConfig,
}

impl ChannelListener {
    pub async fn bind(addr: SocketAddr, config: FramerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(ChannelError::Io)?;
        info!("Listening on {}", listener.local_addr().map_err(ChannelError::Io)?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(ChannelError::Io)
    }

    /// Wait for the next connection
    pub async fn accept(&self) -> Result<(SecureChannel<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await.map_err(ChannelError::Io)?;
        stream.set_nodelay(true).map_err(ChannelError::Io)?;
        debug!("Accepted connection from {}", peer);

        Ok((SecureChannel::new(stream, self.config.clone()), peer))
    }
}

/// Open a connection to `addr`, giving up after `connect_timeout`
pub async fn connect<A>(
    addr: A,
    connect_timeout: Duration,
    config: FramerConfig,
) -> Result<SecureChannel<TcpStream>>
where
    A: ToSocketAddrs,
{
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ChannelError::Timeout(connect_timeout))?
        .map_err(ChannelError::Io)?;
    stream.set_nodelay(true).map_err(ChannelError::Io)?;

    if let Ok(peer) = stream.peer_addr() {
        debug!("Connected to {}", peer);
    }

    Ok(SecureChannel::new(stream, config))
}
