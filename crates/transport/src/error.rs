//! Channel error taxonomy

use pixelpost_crypto::{CipherError, KeyError};
use pixelpost_protocol::{CodecError, FrameError};
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Every failure a connection can hit. All of them end the connection.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Session key decryption failed")]
    Decryption,

    #[error("Message failed integrity check")]
    Integrity,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Channel is not secure")]
    ChannelNotSecure,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => ChannelError::ConnectionClosed,
            _ => ChannelError::Io(e),
        }
    }
}

impl From<FrameError> for ChannelError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooLarge { size, max } => ChannelError::MessageTooLarge { size, max },
        }
    }
}

impl From<KeyError> for ChannelError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::KeyGeneration(msg) => ChannelError::KeyGeneration(msg),
            KeyError::Decryption => ChannelError::Decryption,
            KeyError::Encryption(msg) => ChannelError::Encryption(msg),
            KeyError::InvalidPublicKey(msg) => ChannelError::InvalidPublicKey(msg),
        }
    }
}

impl From<CipherError> for ChannelError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::EncryptionFailed => ChannelError::Encryption(e.to_string()),
            CipherError::IntegrityFailed => ChannelError::Integrity,
        }
    }
}
