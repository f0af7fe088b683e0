//! PixelPost Client Library

pub mod config;
pub mod fetch;

pub use config::ClientConfig;
pub use fetch::{fetch_image, fetch_once};
