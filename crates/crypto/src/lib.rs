//! PixelPost Crypto - Key transport and session encryption
//!
//! This crate provides:
//! - Ephemeral RSA key pairs (>= 3072 bits) and RSA-OAEP session key wrapping
//! - AES-256-GCM session cipher with direction/sequence-bound associated data
//! - Redacted `SessionKey` handling

mod aes;
mod key_transport;

pub use aes::*;
pub use key_transport::*;
