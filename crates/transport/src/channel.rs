//! Secure channel over one connection

use crate::error::{ChannelError, Result};
use crate::framer::{FramerConfig, WireFramer};
use pixelpost_crypto::SessionCipher;
use pixelpost_protocol::{AppMessage, Status};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};
use uuid::Uuid;

/// Handshake progress of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingKeyRequest,
    PublicKeySent,
    AwaitingSessionKey,
    Secure,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::AwaitingKeyRequest => "awaiting-key-request",
            HandshakeState::PublicKeySent => "public-key-sent",
            HandshakeState::AwaitingSessionKey => "awaiting-session-key",
            HandshakeState::Secure => "secure",
            HandshakeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One connection, its handshake state and (once secure) its session cipher
///
/// Application traffic is refused until the handshake has installed a cipher.
/// The first error during `send`/`recv` marks the channel `Failed` and drops
/// the cipher; there is no resynchronisation.
pub struct SecureChannel<S> {
    id: Uuid,
    framer: WireFramer<S>,
    state: HandshakeState,
    cipher: Option<SessionCipher>,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: FramerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            framer: WireFramer::new(stream, config),
            state: HandshakeState::AwaitingKeyRequest,
            cipher: None,
        }
    }

    /// Connection id, for log correlation only
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_secure(&self) -> bool {
        self.state == HandshakeState::Secure && self.cipher.is_some()
    }

    /// Encrypt and send one message
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<()> {
        if !self.is_secure() {
            return Err(ChannelError::ChannelNotSecure);
        }

        let result = match self.cipher.as_mut() {
            Some(cipher) => match cipher.encrypt(plaintext) {
                Ok(ciphertext) => self.framer.write_frame(&ciphertext).await,
                Err(e) => Err(e.into()),
            },
            None => Err(ChannelError::ChannelNotSecure),
        };

        self.fail_on_error(result)
    }

    /// Receive and decrypt one message
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        if !self.is_secure() {
            return Err(ChannelError::ChannelNotSecure);
        }

        let result = match self.framer.read_frame().await {
            Ok(ciphertext) => match self.cipher.as_mut() {
                Some(cipher) => cipher.decrypt(&ciphertext).map_err(ChannelError::from),
                None => Err(ChannelError::ChannelNotSecure),
            },
            Err(e) => Err(e),
        };

        self.fail_on_error(result)
    }

    pub async fn send_message(&mut self, message: &AppMessage) -> Result<()> {
        trace!("Sending {} message", message.kind());
        let encoded = message.to_bytes();
        let encoded = self.fail_on_error(encoded.map_err(ChannelError::from))?;
        self.send(&encoded).await
    }

    pub async fn recv_message(&mut self) -> Result<AppMessage> {
        let plaintext = self.recv().await?;
        let decoded = AppMessage::from_bytes(&plaintext).map_err(ChannelError::from);
        let message = self.fail_on_error(decoded)?;
        trace!("Received {} message", message.kind());
        Ok(message)
    }

    /// Close the write half. The channel is unusable afterwards.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.mark_failed();
        self.framer.shutdown().await
    }

    pub fn bytes_sent(&self) -> u64 {
        self.framer.bytes_sent()
    }

    pub fn bytes_received(&self) -> u64 {
        self.framer.bytes_received()
    }

    pub(crate) fn framer_mut(&mut self) -> &mut WireFramer<S> {
        &mut self.framer
    }

    pub(crate) fn transition(&mut self, next: HandshakeState) {
        debug!("Handshake state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Install the session cipher and mark the channel secure
    pub(crate) fn install_cipher(&mut self, cipher: SessionCipher) {
        self.cipher = Some(cipher);
        self.transition(HandshakeState::Secure);
    }

    pub(crate) fn mark_failed(&mut self) {
        if self.state != HandshakeState::Failed {
            self.transition(HandshakeState::Failed);
        }
        self.cipher = None;
    }

    /// Plaintext status frame, used on the handshake path and to refuse
    /// application requests before the handshake. Never written once the
    /// channel has failed.
    pub(crate) async fn send_status(&mut self, status: Status) -> Result<()> {
        if self.state == HandshakeState::Failed {
            return Err(ChannelError::ChannelNotSecure);
        }
        self.framer.write_frame(&[status.to_byte()]).await
    }

    fn fail_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!("Channel failed: {}", e);
            self.mark_failed();
        }
        result
    }
}
