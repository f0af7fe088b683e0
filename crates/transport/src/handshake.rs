//! Key exchange handshake
//!
//! ```text
//! Initiator                                   Responder
//!   |--- "Get RSA public key" -------------------->|  AwaitingKeyRequest
//!   |<-- PublicKeyMessage{modulus, exponent} ------|  PublicKeySent
//!   |--- RSA-OAEP(session key) ------------------->|  AwaitingSessionKey
//!   |<-- status byte (OK | BAD_REQUEST) -----------|  Secure | Failed
//! ```
//!
//! A failed handshake closes the connection. The initiator has to reconnect
//! and start over; nothing is retried on the same socket.

use crate::channel::{HandshakeState, SecureChannel};
use crate::error::{ChannelError, Result};
use pixelpost_crypto::{
    RsaKeyPair, RsaPeerKey, Role, SessionCipher, SessionKey, MIN_MODULUS_BITS,
};
use pixelpost_protocol::{is_key_request, Status, KEY_REQUEST};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Responder handshake settings
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Modulus size of the per-connection RSA key
    pub rsa_bits: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            rsa_bits: MIN_MODULUS_BITS,
        }
    }
}

/// Responder side of the handshake
///
/// Generates a fresh key pair for every connection it accepts; the private
/// key is dropped as soon as the session key has been unwrapped.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    config: HandshakeConfig,
}

impl Responder {
    pub fn new(config: HandshakeConfig) -> Self {
        Self { config }
    }

    /// Run the handshake on a fresh channel. On success the channel is secure.
    pub async fn accept<S>(&self, channel: &mut SecureChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if channel.state() != HandshakeState::AwaitingKeyRequest {
            return Err(ChannelError::BadRequest(format!(
                "handshake not accepted in state {}",
                channel.state()
            )));
        }

        let result = self.run(channel).await;
        finish(channel, result).await
    }

    async fn run<S>(&self, channel: &mut SecureChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = read_request(channel).await?;
        if !is_key_request(&request) {
            return reject(
                channel,
                ChannelError::BadRequest("first message was not a key request".to_string()),
            )
            .await;
        }

        let key_pair = generate_key_pair(self.config.rsa_bits).await?;
        let public_key = key_pair.export_public()?;
        debug!(
            "Generated {} bit key {}",
            key_pair.modulus_bits(),
            key_pair.public_key().fingerprint()
        );

        channel.transition(HandshakeState::PublicKeySent);
        channel.framer_mut().write_frame(&public_key).await?;

        channel.transition(HandshakeState::AwaitingSessionKey);
        let wrapped = read_request(channel).await?;

        let session_key = match key_pair.unwrap_session_key(&wrapped) {
            Ok(key) => key,
            Err(e) => return reject(channel, e.into()).await,
        };

        channel.install_cipher(SessionCipher::new(&session_key, Role::Responder));
        channel.send_status(Status::Ok).await?;

        info!(
            "Handshake complete (key {})",
            key_pair.public_key().fingerprint()
        );
        Ok(())
    }
}

/// Initiator side of the handshake
///
/// Consumed by [`Initiator::connect`], so a session key is never used for
/// more than one connection.
#[derive(Debug, Default)]
pub struct Initiator {
    session_key: Option<SessionKey>,
}

impl Initiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `key` instead of generating one
    pub fn with_session_key(key: SessionKey) -> Self {
        Self {
            session_key: Some(key),
        }
    }

    pub async fn connect<S>(self, channel: &mut SecureChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if channel.state() != HandshakeState::AwaitingKeyRequest {
            return Err(ChannelError::BadRequest(format!(
                "handshake not started from state {}",
                channel.state()
            )));
        }

        let result = self.run(channel).await;
        finish(channel, result).await
    }

    async fn run<S>(self, channel: &mut SecureChannel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        channel.framer_mut().write_frame(KEY_REQUEST).await?;
        channel.transition(HandshakeState::PublicKeySent);

        let payload = channel.framer_mut().read_frame().await?;
        if let Ok(Status::BadRequest) = Status::from_payload(&payload) {
            return Err(ChannelError::BadRequest(
                "responder rejected the key request".to_string(),
            ));
        }

        let peer = RsaPeerKey::import(&payload)?;
        debug!(
            "Received {} bit responder key {}",
            peer.modulus_bits(),
            peer.fingerprint()
        );

        let session_key = self.session_key.unwrap_or_else(SessionKey::generate);
        let wrapped = peer.wrap_session_key(&session_key)?;

        channel.framer_mut().write_frame(&wrapped).await?;
        channel.transition(HandshakeState::AwaitingSessionKey);

        let status = Status::from_payload(&channel.framer_mut().read_frame().await?)?;
        match status {
            Status::Ok => {
                channel.install_cipher(SessionCipher::new(&session_key, Role::Initiator));
                info!("Handshake complete (responder key {})", peer.fingerprint());
                Ok(())
            }
            Status::BadRequest => Err(ChannelError::BadRequest(
                "responder rejected the session key".to_string(),
            )),
        }
    }
}

async fn generate_key_pair(bits: usize) -> Result<RsaKeyPair> {
    tokio::task::spawn_blocking(move || RsaKeyPair::generate(bits))
        .await
        .map_err(|e| ChannelError::KeyGeneration(e.to_string()))?
        .map_err(ChannelError::from)
}

/// Read a handshake frame on the responder, answering BAD_REQUEST to
/// oversized frames before giving up
async fn read_request<S>(channel: &mut SecureChannel<S>) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match channel.framer_mut().read_frame().await {
        Ok(payload) => Ok(payload),
        Err(e @ ChannelError::MessageTooLarge { .. }) => reject(channel, e).await,
        Err(e) => Err(e),
    }
}

/// Tell the peer its request was bad, then fail with `error`
async fn reject<S, T>(channel: &mut SecureChannel<S>, error: ChannelError) -> Result<T>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = channel.send_status(Status::BadRequest).await {
        debug!("Could not send BAD_REQUEST: {}", e);
    }
    channel.mark_failed();
    Err(error)
}

/// Close the connection if the handshake did not end secure
async fn finish<S>(channel: &mut SecureChannel<S>, result: Result<()>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = &result {
        warn!("Handshake failed in state {}: {}", channel.state(), e);
        if let Err(e) = channel.shutdown().await {
            debug!("Shutdown after failed handshake: {}", e);
        }
    }
    result
}
