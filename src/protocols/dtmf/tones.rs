//! DTMF keypad frequency table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Row (low group) frequencies in Hz
pub const LOW_GROUP: [u32; 4] = [697, 770, 852, 941];

/// Column (high group) frequencies in Hz
pub const HIGH_GROUP: [u32; 4] = [1209, 1336, 1477, 1633];

/// Key that synthesizes as silence
pub const SILENCE: char = '_';

/// Printed form of an undecodable window
pub const UNKNOWN: char = '?';

/// Low/high frequency pair of one keypad key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneFrequencyPair {
    pub key: char,
    pub low: u32,
    pub high: u32,
}

const fn pair(key: char, low: u32, high: u32) -> ToneFrequencyPair {
    ToneFrequencyPair { key, low, high }
}

// Numeric keys first so the numeric keypad is a prefix of the table.
const TONE_TABLE: [ToneFrequencyPair; 16] = [
    pair('0', 941, 1336),
    pair('1', 697, 1209),
    pair('2', 697, 1336),
    pair('3', 697, 1477),
    pair('4', 770, 1209),
    pair('5', 770, 1336),
    pair('6', 770, 1477),
    pair('7', 852, 1209),
    pair('8', 852, 1336),
    pair('9', 852, 1477),
    pair('A', 697, 1633),
    pair('B', 770, 1633),
    pair('C', 852, 1633),
    pair('D', 941, 1633),
    pair('*', 941, 1209),
    pair('#', 941, 1477),
];

const NUMERIC_KEYS: usize = 10;

/// Which keys are recognised when synthesizing and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keypad {
    #[default]
    Numeric,  // 0-9
    Extended, // 0-9, A-D, * and #
}

impl Keypad {
    /// Frequency pairs available on this keypad
    pub fn table(self) -> &'static [ToneFrequencyPair] {
        match self {
            Keypad::Numeric => &TONE_TABLE[..NUMERIC_KEYS],
            Keypad::Extended => &TONE_TABLE,
        }
    }

    pub fn accepts(self, key: char) -> bool {
        self.table().iter().any(|p| p.key == key)
    }
}

/// Frequency pair for `key`, if the keypad has it
pub fn tone_pair(key: char, keypad: Keypad) -> Option<ToneFrequencyPair> {
    keypad.table().iter().copied().find(|p| p.key == key)
}

/// Key whose pair is exactly (`low`, `high`)
pub fn key_for(low: u32, high: u32, keypad: Keypad) -> Option<char> {
    keypad
        .table()
        .iter()
        .find(|p| p.low == low && p.high == high)
        .map(|p| p.key)
}

/// Outcome of classifying one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Tone(char),
    Unknown,
}

impl Symbol {
    pub fn is_unknown(self) -> bool {
        matches!(self, Symbol::Unknown)
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::Tone(key) => key,
            Symbol::Unknown => UNKNOWN,
        }
    }
}

impl From<char> for Symbol {
    fn from(c: char) -> Self {
        if c == UNKNOWN {
            Symbol::Unknown
        } else {
            Symbol::Tone(c)
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
