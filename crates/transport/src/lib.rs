//! PixelPost Transport - Secure channel over TCP
//!
//! This crate provides:
//! - Length-prefixed frame I/O with size caps and timeouts
//! - RSA-OAEP handshake (responder and initiator)
//! - `SecureChannel`: AES-256-GCM encrypted, fail-closed message channel
//! - File transfer on top of a secure channel
//! - TCP listener/connect helpers

mod channel;
mod error;
mod file_transfer;
mod framer;
mod handshake;
mod listener;

pub use channel::*;
pub use error::*;
pub use file_transfer::*;
pub use framer::*;
pub use handshake::*;
pub use listener::*;
