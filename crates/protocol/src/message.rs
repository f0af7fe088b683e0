//! Handshake and application message definitions
//!
//! Handshake messages travel as plain frame payloads:
//! - the key request is the ASCII literal [`KEY_REQUEST`]
//! - the public key is a versioned [`PublicKeyMessage`]
//! - the wrapped session key is raw RSA-OAEP ciphertext
//! - the handshake result is a single [`Status`] byte
//!
//! Once the channel is secure every frame carries an encrypted, versioned
//! [`AppMessage`]. Versioned encodings are one version byte followed by a
//! validated rkyv archive.

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use thiserror::Error;

/// First message of every handshake, sent by the initiator
pub const KEY_REQUEST: &[u8] = b"Get RSA public key";

/// Version byte prefixed to every structured message
pub const WIRE_VERSION: u8 = 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Empty message")]
    Empty,

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown status byte: 0x{0:02x}")]
    UnknownStatus(u8),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Returns true if `payload` is exactly the key request literal
pub fn is_key_request(payload: &[u8]) -> bool {
    payload == KEY_REQUEST
}

/// Wire-level result code
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[rkyv(derive(Debug))]
pub enum Status {
    Ok,
    BadRequest,
}

impl Status {
    /// Single-byte encoding used on the handshake path
    pub fn to_byte(self) -> u8 {
        match self {
            Status::Ok => 0x00,
            Status::BadRequest => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::BadRequest),
            other => Err(CodecError::UnknownStatus(other)),
        }
    }

    /// Decode a status frame payload (exactly one byte)
    pub fn from_payload(payload: &[u8]) -> Result<Self, CodecError> {
        match payload {
            [byte] => Self::from_byte(*byte),
            [] => Err(CodecError::Empty),
            _ => Err(CodecError::Malformed(format!(
                "status frame of {} bytes",
                payload.len()
            ))),
        }
    }
}

/// Responder's RSA public key as sent during the handshake
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub struct PublicKeyMessage {
    /// Modulus, big-endian
    pub modulus: Vec<u8>,

    /// Public exponent, big-endian
    pub exponent: Vec<u8>,
}

impl PublicKeyMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let archived = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
        Ok(seal(&archived))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let body = open(data)?;
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&body)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

/// Kinds of request an initiator can make over a secure channel
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[rkyv(derive(Debug))]
pub enum RequestKind {
    /// Ask the responder for its image file
    GetImage,
}

/// A complete file as transferred in one message
#[derive(Archive, Serialize, Deserialize, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub struct FileRecord {
    /// Final path component only
    pub filename: String,

    /// File contents
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Application message carried inside encrypted frames
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub enum AppMessage {
    Request(RequestKind),
    File(FileRecord),
    Status(Status),
}

impl AppMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let archived = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
        Ok(seal(&archived))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let body = open(data)?;
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&body)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            AppMessage::Request(_) => "request",
            AppMessage::File(_) => "file",
            AppMessage::Status(_) => "status",
        }
    }
}

/// Prefix an archive with the wire version
fn seal(archived: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + archived.len());
    out.push(WIRE_VERSION);
    out.extend_from_slice(archived);
    out
}

/// Strip and check the version byte, copying the body into aligned storage
/// so rkyv validation does not trip on the one-byte offset.
fn open(data: &[u8]) -> Result<AlignedVec<16>, CodecError> {
    let (&version, body) = data.split_first().ok_or(CodecError::Empty)?;
    if version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let mut aligned = AlignedVec::<16>::with_capacity(body.len());
    aligned.extend_from_slice(body);
    Ok(aligned)
}
