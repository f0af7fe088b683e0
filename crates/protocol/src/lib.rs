//! PixelPost Protocol - Wire framing and message definitions
//!
//! This crate defines the bytes that travel between initiator and responder:
//! - `FrameHeader`: 4-byte big-endian length prefix of every frame
//! - `KEY_REQUEST` / `PublicKeyMessage` / `Status`: the handshake messages
//! - `AppMessage`: typed application messages sent once the channel is secure
//!
//! Structured messages use a version byte followed by a validated rkyv archive.

mod frame;
mod message;

pub use frame::*;
pub use message::*;
