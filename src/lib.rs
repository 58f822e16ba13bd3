//! Redfire DTMF - reference tone generator and multichannel WAV decoder
//!
//! Synthesizes DTMF key files for telecom test rigs and recovers the key
//! sequence from recorded multichannel PCM using per-window Goertzel
//! detection and a debouncing merge across channels.
//!
//! **Sponsored by [Carrier One Inc](https://carrierone.com) - Professional Telecommunications Solutions**

pub mod config;
pub mod core;
pub mod protocols;
pub mod interfaces;
pub mod error;
pub mod utils;

pub use error::{Error, Result};
pub use protocols::dtmf::SampleBuffer;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
