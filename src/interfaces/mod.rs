//! File interfaces for Redfire DTMF

pub mod wav;

pub use wav::{WavFormat, WavHeader, WavSpec};
