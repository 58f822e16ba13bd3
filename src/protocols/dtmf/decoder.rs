//! Windowed, multichannel DTMF sequence decoding
//!
//! Each channel is cut into fixed-width windows that are classified on their
//! own, giving a channel x window [`SymbolMatrix`]. The matrix is then merged
//! column by column into one digit sequence: repeated columns are collapsed,
//! all-noise columns are dropped, and a partially unknown column that shares
//! nothing with the last emitted one is held back until the next confirmed
//! column decides whether it was real.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::classifier::{ClassifierParams, DtmfClassifier};
use super::tones::Symbol;
use super::SampleBuffer;

/// Shortest window, as a percentage of one second, at which the default
/// purity ratio still separates adjacent low-group tones
pub const MIN_RELIABLE_WINDOW_PERCENT: u32 = 10;

/// Windowing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoderParams {
    /// Window width as a percentage of one second of audio
    pub window_percent: u32,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self { window_percent: 10 }
    }
}

/// Per-window symbols, one row per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatrix {
    channels: usize,
    windows: usize,
    cells: Vec<Symbol>,
}

impl SymbolMatrix {
    pub fn new(channels: usize, windows: usize) -> Self {
        Self {
            channels,
            windows,
            cells: vec![Symbol::Unknown; channels * windows],
        }
    }

    /// Build from explicit rows; rows shorter than the longest are padded with unknowns
    pub fn from_rows(rows: Vec<Vec<Symbol>>) -> Self {
        let windows = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut matrix = Self::new(rows.len(), windows);
        for (chan, row) in rows.into_iter().enumerate() {
            matrix.set_row(chan, &row);
        }
        matrix
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn windows(&self) -> usize {
        self.windows
    }

    pub fn get(&self, chan: usize, window: usize) -> Symbol {
        self.cells[chan * self.windows + window]
    }

    pub fn row(&self, chan: usize) -> &[Symbol] {
        &self.cells[chan * self.windows..(chan + 1) * self.windows]
    }

    fn set_row(&mut self, chan: usize, symbols: &[Symbol]) {
        let n = symbols.len().min(self.windows);
        let start = chan * self.windows;
        self.cells[start..start + n].copy_from_slice(&symbols[..n]);
    }

    /// Symbols of every channel at one window index
    pub fn column(&self, window: usize) -> Vec<Symbol> {
        (0..self.channels).map(|chan| self.get(chan, window)).collect()
    }

    /// Each row rendered as a string, for verbose output
    pub fn row_strings(&self) -> Vec<String> {
        (0..self.channels)
            .map(|chan| self.row(chan).iter().map(|s| s.as_char()).collect())
            .collect()
    }
}

/// Decoded time slots, each holding one symbol per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSequence {
    slots: Vec<Vec<Symbol>>,
}

impl DecodedSequence {
    pub fn slots(&self) -> &[Vec<Symbol>] {
        &self.slots
    }

    /// True when nothing was detected and the single slot is all unknown
    pub fn is_silent(&self) -> bool {
        self.slots.iter().all(|slot| slot.iter().all(|s| s.is_unknown()))
    }

    pub fn slot_strings(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.iter().map(|s| s.as_char()).collect())
            .collect()
    }
}

impl fmt::Display for DecodedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot_strings().join(","))
    }
}

/// Merge state carried from one column to the next
#[derive(Debug)]
pub struct DecoderState {
    prev: Vec<Option<Symbol>>,
    deferred: Option<Vec<Symbol>>,
    slots: Vec<Vec<Symbol>>,
}

impl DecoderState {
    pub fn new(channels: usize) -> Self {
        Self {
            prev: vec![None; channels],
            deferred: None,
            slots: Vec::new(),
        }
    }

    /// Feed the next column
    pub fn push(&mut self, column: &[Symbol]) {
        let channels = self.prev.len();
        let same = column
            .iter()
            .zip(&self.prev)
            .filter(|(symbol, prev)| Some(**symbol) == **prev)
            .count();
        let unknown = column.iter().filter(|s| s.is_unknown()).count();

        // Repeat of the last emitted column, or nothing but noise
        if same == channels || unknown == channels {
            return;
        }

        if unknown > 0 {
            // Some channel is still holding the previous digit: transition noise
            if same > 0 {
                return;
            }
            trace!("Deferring ambiguous column {:?}", column);
            self.deferred = Some(column.to_vec());
            return;
        }

        // A held column is emitted as a separate slot, ahead of this one
        if let Some(deferred) = self.deferred.take() {
            let continues_prev = column
                .iter()
                .zip(&self.prev)
                .any(|(symbol, prev)| !symbol.is_unknown() && Some(*symbol) == *prev);
            if continues_prev {
                debug!("Keeping deferred column {:?}", deferred);
                self.slots.push(deferred);
            } else {
                trace!("Dropping deferred column {:?}", deferred);
            }
        }

        for (prev, symbol) in self.prev.iter_mut().zip(column) {
            *prev = Some(*symbol);
        }
        self.slots.push(column.to_vec());
    }

    pub fn finish(self) -> DecodedSequence {
        let mut slots = self.slots;
        if slots.is_empty() {
            slots.push(vec![Symbol::Unknown; self.prev.len()]);
        }
        DecodedSequence { slots }
    }
}

/// Splits channels into windows, classifies them and merges the result
#[derive(Debug, Clone, Default)]
pub struct SequenceDecoder {
    params: DecoderParams,
    classifier: DtmfClassifier,
}

impl SequenceDecoder {
    pub fn new(params: DecoderParams, classifier: ClassifierParams) -> Self {
        Self {
            params,
            classifier: DtmfClassifier::new(classifier),
        }
    }

    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    pub fn classifier(&self) -> &DtmfClassifier {
        &self.classifier
    }

    /// Samples per window at `sample_rate`
    pub fn window_width(&self, sample_rate: u32) -> usize {
        (sample_rate / 100 * self.params.window_percent) as usize
    }

    /// Classify every whole window of one channel; a trailing partial window is ignored
    pub fn classify_channel(&self, samples: &[i32], sample_rate: u32) -> Vec<Symbol> {
        let width = self.window_width(sample_rate);
        if width == 0 {
            return Vec::new();
        }
        samples
            .chunks_exact(width)
            .map(|window| self.classifier.classify(window, sample_rate))
            .collect()
    }

    pub fn decode(&self, channels: &[SampleBuffer], sample_rate: u32) -> SymbolMatrix {
        let rows = channels
            .iter()
            .map(|samples| self.classify_channel(samples, sample_rate))
            .collect();
        SymbolMatrix::from_rows(rows)
    }

    pub fn merge(&self, matrix: &SymbolMatrix) -> DecodedSequence {
        let mut state = DecoderState::new(matrix.channels());
        for window in 0..matrix.windows() {
            state.push(&matrix.column(window));
        }
        let sequence = state.finish();
        debug!(
            "Merged {} windows x {} channels into {}",
            matrix.windows(),
            matrix.channels(),
            sequence
        );
        sequence
    }
}
