//! Frame - the length-prefixed unit carried on the wire
//!
//! ```text
//! +-------------------+------------------+
//! | length (u32, BE)  | payload          |
//! | 4 bytes           | `length` bytes   |
//! +-------------------+------------------+
//! ```
//!
//! The payload is either a handshake message or ciphertext; this module never
//! looks inside it.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Size of the length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default cap on a single frame's payload (64 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// Length prefix of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes
    pub length: u32,
}

impl FrameHeader {
    /// Build the header for `payload`, enforcing `max`
    pub fn for_payload(payload: &[u8], max: usize) -> Result<Self, FrameError> {
        let size = payload.len();
        if size > max || size > u32::MAX as usize {
            return Err(FrameError::TooLarge { size, max });
        }

        Ok(Self {
            length: size as u32,
        })
    }

    /// Parse a received length prefix
    pub fn from_bytes(bytes: [u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            length: u32::from_be_bytes(bytes),
        }
    }

    /// Serialize the length prefix
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        self.length.to_be_bytes()
    }

    /// Check the declared length against `max` and return it as a `usize`
    pub fn checked_len(&self, max: usize) -> Result<usize, FrameError> {
        let size = self.length as usize;
        if size > max {
            return Err(FrameError::TooLarge { size, max });
        }
        Ok(size)
    }
}

/// Encode a complete frame (header + payload) into one buffer
pub fn encode_frame(payload: &[u8], max: usize) -> Result<BytesMut, FrameError> {
    let header = FrameHeader::for_payload(payload, max)?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_slice(&header.to_bytes());
    buf.put_slice(payload);

    Ok(buf)
}
