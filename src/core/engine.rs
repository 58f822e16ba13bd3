//! Top-level DTMF operations: generate reference files, analyze recordings

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DtmfConfig;
use crate::interfaces::wav::{self, WavHeader, WavSpec};
use crate::protocols::dtmf::{add_noise, SampleBuffer, SequenceDecoder, SymbolMatrix, ToneSynthesizer, SILENCE};
use crate::{Error, Result};

/// Result of decoding one file
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub header: WavHeader,
    /// Samples per classification window
    pub window: usize,
    /// Per-channel window symbols
    pub windows: Vec<String>,
    /// Merged time slots
    pub slots: Vec<String>,
    pub sequence: String,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs synthesis and analysis with one validated configuration
pub struct DtmfEngine {
    config: DtmfConfig,
    decoder: SequenceDecoder,
}

impl DtmfEngine {
    pub fn new(config: DtmfConfig) -> Result<Self> {
        config.validate()?;
        let decoder = SequenceDecoder::new(
            config.analysis.decoder_params(),
            config.analysis.classifier_params(),
        );
        Ok(Self { config, decoder })
    }

    pub fn config(&self) -> &DtmfConfig {
        &self.config
    }

    pub fn decoder(&self) -> &SequenceDecoder {
        &self.decoder
    }

    /// Check a digit string before anything is written
    pub fn validate_digits(&self, digits: &str) -> Result<()> {
        let synthesis = &self.config.synthesis;
        let channels = usize::from(synthesis.channels);

        if digits.chars().count() < channels {
            return Err(Error::invalid_argument(format!(
                "Need at least {} digits for {} channels, got '{}'",
                channels, channels, digits
            )));
        }

        if let Some(bad) = digits
            .chars()
            .find(|&c| c != SILENCE && !synthesis.keypad.accepts(c))
        {
            return Err(Error::invalid_argument(format!(
                "Unsupported digit '{}' for {:?} keypad",
                bad, synthesis.keypad
            )));
        }

        Ok(())
    }

    /// Split `digits` into one file's worth per channel count; a short tail is dropped
    pub fn chunks(&self, digits: &str) -> Vec<String> {
        let keys: Vec<char> = digits.chars().collect();
        keys.chunks_exact(usize::from(self.config.synthesis.channels))
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    /// Write `<chunk>.wav` files into `out_dir`, one key per channel
    pub fn generate<P: AsRef<Path>>(&self, digits: &str, out_dir: P) -> Result<Vec<PathBuf>> {
        self.validate_digits(digits)?;

        let synthesis = &self.config.synthesis;
        let spec = WavSpec {
            channels: synthesis.channels,
            sample_rate: synthesis.sample_rate,
            bits_per_sample: synthesis.bits_per_sample,
            frames: synthesis.frames() as u32,
        };
        let synth = ToneSynthesizer::new(spec.sample_rate, spec.bits_per_sample, synthesis.keypad);

        let mut buf = SampleBuffer::new();
        buf.try_reserve_exact(spec.frames as usize)?;
        buf.resize(spec.frames as usize, 0);

        let mut rng = StdRng::seed_from_u64(synthesis.noise_seed);
        let mut written = Vec::new();

        info!(
            "Generating {} ch, {} Hz, {} bit files of {} frames",
            spec.channels, spec.sample_rate, spec.bits_per_sample, spec.frames
        );

        for chunk in self.chunks(digits) {
            let path = out_dir.as_ref().join(format!("{}.wav", chunk));
            wav::write_header(&path, &spec)?;

            for (chan, key) in chunk.chars().enumerate() {
                synth.fill(key, &mut buf)?;
                add_noise(&mut buf, synthesis.noise_amplitude, spec.bits_per_sample, &mut rng);
                wav::write_channel(&path, &spec, chan, &buf)?;
            }

            debug!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }

    pub fn info<P: AsRef<Path>>(&self, path: P) -> Result<WavHeader> {
        wav::read_header(path)
    }

    /// Classify every channel of `path` and merge the result
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        let path = path.as_ref();
        let header = wav::read_header(path)?;

        let mut rows = Vec::with_capacity(usize::from(header.channels));
        for chan in 0..usize::from(header.channels) {
            let samples = wav::read_channel(path, &header, chan)?;
            rows.push(self.decoder.classify_channel(&samples, header.sample_rate));
        }

        let matrix = SymbolMatrix::from_rows(rows);
        let sequence = self.decoder.merge(&matrix);

        if sequence.is_silent() {
            warn!("{}: no DTMF detected in {} windows", path.display(), matrix.windows());
        } else {
            info!("{}: {}", path.display(), sequence);
        }

        Ok(AnalysisReport {
            file: path.display().to_string(),
            header,
            window: self.decoder.window_width(header.sample_rate),
            windows: matrix.row_strings(),
            slots: sequence.slot_strings(),
            sequence: sequence.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::dtmf::Keypad;

    fn engine(channels: u16) -> DtmfEngine {
        let mut config = DtmfConfig::default();
        config.synthesis.channels = channels;
        DtmfEngine::new(config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = DtmfConfig::default();
        config.synthesis.channels = 3;
        assert!(DtmfEngine::new(config).is_err());
    }

    #[test]
    fn test_digit_validation() {
        let engine = engine(2);
        assert!(engine.validate_digits("12_4").is_ok());
        assert!(matches!(engine.validate_digits("1"), Err(Error::InvalidArgument(_))));
        assert!(matches!(engine.validate_digits("1A"), Err(Error::InvalidArgument(_))));
        assert!(matches!(engine.validate_digits("1x"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_extended_keypad_digits() {
        let mut config = DtmfConfig::default();
        config.synthesis.keypad = Keypad::Extended;
        let engine = DtmfEngine::new(config).unwrap();
        assert!(engine.validate_digits("A#*D").is_ok());
    }

    #[test]
    fn test_chunks_drop_short_tail() {
        let engine = engine(2);
        assert_eq!(engine.chunks("1234567"), vec!["12", "34", "56"]);

        let engine = self::engine(4);
        assert_eq!(engine.chunks("12345678_"), vec!["1234", "5678"]);
    }

    #[test]
    fn test_generate_and_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(2);

        let files = engine.generate("1234", dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("12.wav"), dir.path().join("34.wav")]);

        let report = engine.analyze(&files[0]).unwrap();
        assert_eq!(report.sequence, "12");
        assert_eq!(report.window, 800);
        assert_eq!(report.windows, vec!["1".repeat(10), "2".repeat(10)]);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["sequence"], "12");
        assert_eq!(json["header"]["format"], "pcm");
        assert_eq!(json["slots"][0], "12");

        let report = engine.analyze(&files[1]).unwrap();
        assert_eq!(report.sequence, "34");
    }

    #[test]
    fn test_silence_file_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(2);

        let files = engine.generate("__", dir.path()).unwrap();
        let report = engine.analyze(&files[0]).unwrap();
        assert_eq!(report.sequence, "??");
        assert_eq!(report.slots, vec!["??"]);
    }

    #[test]
    fn test_mixed_silence_channel() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(2);

        let files = engine.generate("7_", dir.path()).unwrap();
        let report = engine.analyze(&files[0]).unwrap();
        // Channel 1 never leaves unknown, so no column is ever confirmed
        assert_eq!(report.windows, vec!["7".repeat(10), "?".repeat(10)]);
        assert_eq!(report.sequence, "??");
    }

    #[test]
    fn test_noisy_generation_still_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DtmfConfig::default();
        config.synthesis.noise_amplitude = 1000;
        config.synthesis.noise_seed = 42;
        let engine = DtmfEngine::new(config).unwrap();

        let files = engine.generate("90", dir.path()).unwrap();
        let report = engine.analyze(&files[0]).unwrap();
        assert_eq!(report.sequence, "90");
    }

    #[test]
    fn test_info_reads_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DtmfConfig::default();
        config.synthesis.bits_per_sample = 24;
        config.synthesis.sample_rate = 16000;
        let engine = DtmfEngine::new(config).unwrap();

        let files = engine.generate("55", dir.path()).unwrap();
        let header = engine.info(&files[0]).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 16000);
        assert_eq!(header.bits_per_sample, 24);
        assert_eq!(header.frames, 16000);

        assert_eq!(engine.analyze(&files[0]).unwrap().sequence, "55");
    }
}
