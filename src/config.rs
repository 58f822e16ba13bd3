//! Configuration management for Redfire DTMF

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::protocols::dtmf::{ClassifierParams, DecoderParams, Keypad, MIN_RELIABLE_WINDOW_PERCENT};
use crate::{Error, Result};

/// Upper bound on channels per file
pub const MAX_CHANNELS: u16 = 16;

/// Sample rates accepted for synthesis
pub const SUPPORTED_RATES: [u32; 12] = [
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 64000, 88200, 96000, 176400, 192000,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtmfConfig {
    pub synthesis: SynthesisConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length of each generated file
    pub duration_ms: u32,
    pub keypad: Keypad,
    /// Peak of additive white noise, 0 for clean tones
    pub noise_amplitude: u32,
    pub noise_seed: u64,
    pub output_dir: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            channels: 2,
            bits_per_sample: 16,
            duration_ms: 1000,
            keypad: Keypad::Numeric,
            noise_amplitude: 0,
            noise_seed: 0,
            output_dir: ".".to_string(),
        }
    }
}

impl SynthesisConfig {
    /// Samples per channel in each generated file
    pub fn frames(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.duration_ms) / 1000
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window width as a percentage of one second
    pub window_percent: u32,
    pub detection_floor: f64,
    pub purity_ratio: f64,
    pub keypad: Keypad,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let classifier = ClassifierParams::default();
        Self {
            window_percent: DecoderParams::default().window_percent,
            detection_floor: classifier.detection_floor,
            purity_ratio: classifier.purity_ratio,
            keypad: classifier.keypad,
        }
    }
}

impl AnalysisConfig {
    pub fn classifier_params(&self) -> ClassifierParams {
        ClassifierParams {
            detection_floor: self.detection_floor,
            purity_ratio: self.purity_ratio,
            keypad: self.keypad,
        }
    }

    pub fn decoder_params(&self) -> DecoderParams {
        DecoderParams {
            window_percent: self.window_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "full")]
    Full,
}

impl DtmfConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DtmfConfig = toml::from_str(&contents)
            .map_err(|e| Error::parse(format!("Invalid TOML: {}", e)))?;
        Ok(config)
    }

    /// Defaults overridden by `REDFIRE_DTMF_<SECTION>__<KEY>` variables
    pub fn load_from_env() -> Result<Self> {
        let defaults = config::Config::try_from(&DtmfConfig::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::Environment::with_prefix("REDFIRE_DTMF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        let synthesis = &self.synthesis;

        if !SUPPORTED_RATES.contains(&synthesis.sample_rate) {
            return Err(Error::invalid_argument(format!(
                "Unsupported sample rate: {}",
                synthesis.sample_rate
            )));
        }

        if synthesis.channels == 0 || synthesis.channels % 2 != 0 || synthesis.channels > MAX_CHANNELS {
            return Err(Error::invalid_argument(format!(
                "Channel count must be even and at most {}: {}",
                MAX_CHANNELS, synthesis.channels
            )));
        }

        if !crate::interfaces::wav::SUPPORTED_BITS.contains(&synthesis.bits_per_sample) {
            return Err(Error::invalid_argument(format!(
                "Unsupported bit depth: {}",
                synthesis.bits_per_sample
            )));
        }

        if synthesis.frames() == 0 || synthesis.frames() > u64::from(u32::MAX) {
            return Err(Error::invalid_argument(format!(
                "Invalid duration: {} ms",
                synthesis.duration_ms
            )));
        }

        let analysis = &self.analysis;

        if analysis.window_percent == 0 || analysis.window_percent > 100 {
            return Err(Error::invalid_argument(format!(
                "Window percent must be within 1..=100: {}",
                analysis.window_percent
            )));
        }

        if analysis.window_percent < MIN_RELIABLE_WINDOW_PERCENT
            && analysis.purity_ratio >= ClassifierParams::default().purity_ratio
        {
            warn!(
                "Window of {}% is below {}%; most windows will classify as unknown at purity ratio {}",
                analysis.window_percent, MIN_RELIABLE_WINDOW_PERCENT, analysis.purity_ratio
            );
        }

        if analysis.detection_floor.is_nan() || analysis.detection_floor <= 0.0 {
            return Err(Error::invalid_argument("Detection floor must be positive"));
        }

        if analysis.purity_ratio.is_nan() || analysis.purity_ratio <= 1.0 {
            return Err(Error::invalid_argument("Purity ratio must be greater than 1"));
        }

        crate::utils::logger::parse_log_level(&self.logging.level)?;

        Ok(())
    }

    pub fn default_config() -> Self {
        Self::default()
    }
}
