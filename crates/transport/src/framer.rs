//! Length-prefixed frame I/O over an async byte stream

use crate::error::{ChannelError, Result};
use pixelpost_protocol::{encode_frame, FrameHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

/// Default timeout for a single frame read or write
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the initial payload allocation. Larger frames grow the
/// buffer as bytes actually arrive.
const INITIAL_READ_CAPACITY: usize = 64 * 1024;

/// Framer configuration
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Largest payload accepted or sent
    pub max_frame_size: usize,

    /// Deadline for each frame read/write
    pub io_timeout: Duration,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Reads and writes whole frames; never exposes a partial one
pub struct WireFramer<S> {
    stream: S,
    config: FramerConfig,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S> WireFramer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: FramerConfig) -> Self {
        Self {
            stream,
            config,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Write one frame and flush it
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(payload, self.config.max_frame_size)?;
        let io_timeout = self.config.io_timeout;
        let stream = &mut self.stream;

        timeout(io_timeout, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ChannelError::Timeout(io_timeout))??;

        self.bytes_sent += frame.len() as u64;
        trace!("Wrote frame: {} bytes", payload.len());

        Ok(())
    }

    /// Read one complete frame payload
    ///
    /// The declared length is checked against `max_frame_size` before any of
    /// the payload is buffered.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let max = self.config.max_frame_size;
        let io_timeout = self.config.io_timeout;
        let stream = &mut self.stream;

        let payload = timeout(io_timeout, async {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            stream.read_exact(&mut header).await?;
            let len = FrameHeader::from_bytes(header).checked_len(max)?;

            let mut payload = Vec::with_capacity(len.min(INITIAL_READ_CAPACITY));
            let read = (&mut *stream)
                .take(len as u64)
                .read_to_end(&mut payload)
                .await?;

            if read < len {
                return Err(ChannelError::ConnectionClosed);
            }

            Ok::<_, ChannelError>(payload)
        })
        .await
        .map_err(|_| ChannelError::Timeout(io_timeout))??;

        self.bytes_received += (FRAME_HEADER_SIZE + payload.len()) as u64;
        trace!("Read frame: {} bytes", payload.len());

        Ok(payload)
    }

    /// Shut down the write half of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn small_config(max: usize) -> FramerConfig {
        FramerConfig {
            max_frame_size: max,
            io_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (a, b) = duplex(1024 * 1024);
        let mut writer = WireFramer::new(a, FramerConfig::default());
        let mut reader = WireFramer::new(b, FramerConfig::default());

        let large = vec![0x42u8; 200 * 1024];
        let sender = tokio::spawn(async move {
            writer.write_frame(b"Get RSA public key").await.unwrap();
            writer.write_frame(b"").await.unwrap();
            writer.write_frame(&large).await.unwrap();
            writer
        });

        assert_eq!(reader.read_frame().await.unwrap(), b"Get RSA public key");
        assert_eq!(reader.read_frame().await.unwrap(), b"");
        assert_eq!(reader.read_frame().await.unwrap().len(), 200 * 1024);

        let writer = sender.await.unwrap();
        assert_eq!(writer.bytes_sent(), reader.bytes_received());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_payload() {
        let (mut raw, b) = duplex(64);
        let mut reader = WireFramer::new(b, small_config(1024));

        // Only the header is ever written; a framer that tried to buffer the
        // payload would block until the timeout instead.
        raw.write_all(&(1025u32).to_be_bytes()).await.unwrap();

        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::MessageTooLarge { size: 1025, max: 1024 }
        ));
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let (a, _b) = duplex(64);
        let mut writer = WireFramer::new(a, small_config(8));

        let err = writer.write_frame(&[0u8; 9]).await.unwrap_err();
        assert!(matches!(err, ChannelError::MessageTooLarge { size: 9, max: 8 }));
        assert_eq!(writer.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn test_eof_mid_payload_is_connection_closed() {
        let (mut raw, b) = duplex(64);
        let mut reader = WireFramer::new(b, small_config(1024));

        raw.write_all(&10u32.to_be_bytes()).await.unwrap();
        raw.write_all(b"abc").await.unwrap();
        drop(raw);

        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_header_is_connection_closed() {
        let (mut raw, b) = duplex(64);
        let mut reader = WireFramer::new(b, small_config(1024));

        raw.write_all(&[0, 0]).await.unwrap();
        drop(raw);

        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let (_raw, b) = duplex(64);
        let mut reader = WireFramer::new(b, small_config(1024));

        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::Timeout(_))
        ));
    }
}
