//! Signaling protocol implementations for Redfire DTMF

pub mod dtmf;

pub use dtmf::{DtmfClassifier, SequenceDecoder, ToneSynthesizer};
