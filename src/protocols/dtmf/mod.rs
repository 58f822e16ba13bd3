//! DTMF (Dual-Tone Multi-Frequency) handling
//!
//! Tone synthesis for reference files and window-based detection for
//! recorded multichannel audio.

pub mod classifier;
pub mod decoder;
pub mod goertzel;
pub mod synth;
pub mod tones;

pub use classifier::{ClassifierParams, DtmfClassifier, GroupLevels};
pub use decoder::{
    DecodedSequence, DecoderParams, DecoderState, SequenceDecoder, SymbolMatrix,
    MIN_RELIABLE_WINDOW_PERCENT,
};
pub use goertzel::goertzel;
pub use synth::{add_noise, full_scale, ToneSynthesizer};
pub use tones::{Keypad, Symbol, ToneFrequencyPair, HIGH_GROUP, LOW_GROUP, SILENCE, UNKNOWN};

/// One channel's samples, sign-extended to 32 bits whatever the file depth
pub type SampleBuffer = Vec<i32>;
