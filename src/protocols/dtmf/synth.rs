//! DTMF tone synthesis

use std::f64::consts::TAU;

use rand::Rng;

use super::tones::{tone_pair, Keypad, SILENCE};
use super::SampleBuffer;
use crate::{Error, Result};

/// Largest positive sample value at `bits_per_sample`
pub fn full_scale(bits_per_sample: u16) -> i64 {
    (1i64 << (bits_per_sample - 1)) - 1
}

/// Generates reference dual-tone windows
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub keypad: Keypad,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32, bits_per_sample: u16, keypad: Keypad) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            keypad,
        }
    }

    /// Per-tone amplitude; two tones summed stay inside the bit depth
    pub fn amplitude(&self) -> f64 {
        (full_scale(self.bits_per_sample) / 2) as f64
    }

    /// Overwrite `buf` with the tone pair for `key`, or zeros for `'_'`
    pub fn fill(&self, key: char, buf: &mut [i32]) -> Result<()> {
        if key == SILENCE {
            buf.fill(0);
            return Ok(());
        }

        let pair = tone_pair(key, self.keypad)
            .ok_or_else(|| Error::invalid_argument(format!("No DTMF tone for key '{}'", key)))?;

        let rate = f64::from(self.sample_rate);
        let step_low = TAU * f64::from(pair.low) / rate;
        let step_high = TAU * f64::from(pair.high) / rate;
        let volume = self.amplitude();

        let mut phase_low: f64 = 0.0;
        let mut phase_high: f64 = 0.0;
        for sample in buf.iter_mut() {
            *sample = ((phase_low.sin() + phase_high.sin()) * volume) as i32;

            phase_low += step_low;
            phase_high += step_high;
            while phase_low >= TAU {
                phase_low -= TAU;
            }
            while phase_high >= TAU {
                phase_high -= TAU;
            }
        }

        Ok(())
    }

    pub fn synthesize(&self, key: char, length: usize) -> Result<SampleBuffer> {
        let mut buf = SampleBuffer::new();
        buf.try_reserve_exact(length)?;
        buf.resize(length, 0);
        self.fill(key, &mut buf)?;
        Ok(buf)
    }
}

/// Add uniform white noise in `[-amplitude, amplitude]`, clamped to the bit depth
pub fn add_noise<R: Rng>(buf: &mut [i32], amplitude: u32, bits_per_sample: u16, rng: &mut R) {
    if amplitude == 0 {
        return;
    }
    let limit = full_scale(bits_per_sample);
    let amplitude = i64::from(amplitude);
    for sample in buf.iter_mut() {
        let noisy = i64::from(*sample) + rng.gen_range(-amplitude..=amplitude);
        *sample = noisy.clamp(-limit - 1, limit) as i32;
    }
}
