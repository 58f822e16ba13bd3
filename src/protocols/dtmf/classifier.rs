//! Dual-tone classifier built on the Goertzel estimator

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::goertzel::goertzel;
use super::tones::{key_for, Keypad, Symbol, HIGH_GROUP, LOW_GROUP};

/// Calibration parameters for window classification.
///
/// The defaults were tuned against half-scale synthesized tones in
/// 100 ms windows. `detection_floor` is an absolute magnitude and has to be
/// recalibrated if the amplitude convention or bit width changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Minimum peak magnitude for either tone group
    pub detection_floor: f64,
    /// Peak must exceed every rival bin by this factor
    pub purity_ratio: f64,
    pub keypad: Keypad,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            detection_floor: 0.5,
            purity_ratio: 20.0,
            keypad: Keypad::Numeric,
        }
    }
}

/// Magnitudes of the four bins of one tone group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupLevels {
    pub levels: [f64; 4],
    pub peak: usize,
}

impl GroupLevels {
    pub fn peak_level(&self) -> f64 {
        self.levels[self.peak]
    }
}

/// Decodes one window into a keypad symbol
#[derive(Debug, Clone, Default)]
pub struct DtmfClassifier {
    params: ClassifierParams,
}

impl DtmfClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Estimate all four bins of `group`, keeping the first maximum on ties
    pub fn group_levels(window: &[i32], sample_rate: u32, group: &[u32; 4]) -> GroupLevels {
        let mut levels = [0.0; 4];
        let mut peak = 0;
        for (i, &freq) in group.iter().enumerate() {
            levels[i] = goertzel(window, sample_rate, freq);
            if levels[peak] < levels[i] {
                peak = i;
            }
        }
        GroupLevels { levels, peak }
    }

    /// Frequency of the dominant bin, or `None` when it is too weak or not pure enough
    fn dominant(&self, levels: &GroupLevels, group: &[u32; 4]) -> Option<u32> {
        let peak = levels.peak_level();
        if peak.is_nan() || peak < self.params.detection_floor {
            return None;
        }

        let contested = levels
            .levels
            .iter()
            .enumerate()
            .any(|(i, &level)| i != levels.peak && level * self.params.purity_ratio > peak);
        if contested {
            return None;
        }

        Some(group[levels.peak])
    }

    pub fn classify(&self, window: &[i32], sample_rate: u32) -> Symbol {
        let low_levels = Self::group_levels(window, sample_rate, &LOW_GROUP);
        let high_levels = Self::group_levels(window, sample_rate, &HIGH_GROUP);

        let low = self.dominant(&low_levels, &LOW_GROUP);
        let high = self.dominant(&high_levels, &HIGH_GROUP);

        match (low, high) {
            (Some(low), Some(high)) => key_for(low, high, self.params.keypad)
                .map(Symbol::Tone)
                .unwrap_or(Symbol::Unknown),
            _ => {
                trace!(
                    "Rejected window: low {:?} high {:?}",
                    low_levels.levels,
                    high_levels.levels
                );
                Symbol::Unknown
            }
        }
    }
}
