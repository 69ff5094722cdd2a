//! Configuration file support
//!
//! Loads a transcode job description from TOML:
//!
//! ```toml
//! [codec]
//! mode = "encode"
//! sample_rate = 48000
//! channels = 2
//!
//! [input]
//! paths = ["voice.pcm"]
//! sample_rate = 44100
//! channels = 2
//!
//! [output]
//! path = "voice.aac"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::adts::AacProfile;
use crate::codec::CodecMode;
use crate::config::{CodecConfig, RateControl};
use crate::error::{Result, TranscodeError};
use crate::pcm::{BitDepth, MixStrategy};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Codec settings
    pub codec: CodecSettings,
    /// Where the data comes from
    pub input: InputSettings,
    /// Where the result goes
    pub output: OutputSettings,
    /// Mixing of several inputs (encode only)
    pub mix: Option<MixStrategy>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// "encode" or "decode"
    pub mode: CodecMode,
    /// Sample rate of the PCM side
    pub sample_rate: u32,
    /// Channel count of the PCM side
    pub channels: u16,
    /// AAC profile: "main", "lc" or "ssr"
    pub profile: Option<AacProfile>,
    /// Target bit rate in bps
    pub bit_rate: Option<u32>,
    /// VBR quality; takes precedence over `bit_rate`
    pub quality: Option<u32>,
    /// Worker poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Raw PCM files (encode) or one ADTS file (decode)
    pub paths: Vec<PathBuf>,
    /// Sample rate of the PCM files
    pub sample_rate: Option<u32>,
    /// Channel count of the PCM files
    pub channels: Option<u16>,
    /// 8 or 16
    pub bit_depth: Option<u8>,
    /// Bytes read per submitted chunk
    pub chunk_bytes: Option<usize>,
    /// Gain applied before encoding, in dB
    pub volume_db: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// File the ADTS stream (encode) or raw PCM (decode) is written to
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Some("pretty".to_string()),
        }
    }
}

/// Layout of the PCM input files
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub paths: Vec<PathBuf>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: BitDepth,
    pub chunk_bytes: usize,
    pub volume_db: Option<i32>,
}

/// Everything the driver needs to run one transcode
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub mode: CodecMode,
    pub codec: CodecConfig,
    pub input: InputSpec,
    pub output: PathBuf,
    /// Set when several encode inputs are mixed into one stream
    pub mix: Option<MixStrategy>,
    pub logging: LoggingSettings,
}

/// Bytes per submitted chunk when the file does not say: 1024 stereo frames
pub const DEFAULT_CHUNK_BYTES: usize = 4096;

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TranscodeError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| TranscodeError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Encode `input.pcm` (48 kHz stereo) to `output.aac`
    pub fn default_config() -> Self {
        Self {
            codec: CodecSettings {
                mode: CodecMode::Encode,
                sample_rate: 48000,
                channels: 2,
                profile: Some(AacProfile::Lc),
                bit_rate: Some(96_000),
                quality: None,
                poll_interval_ms: Some(16),
            },
            input: InputSettings {
                paths: vec![PathBuf::from("input.pcm")],
                sample_rate: Some(48000),
                channels: Some(2),
                bit_depth: Some(16),
                chunk_bytes: Some(DEFAULT_CHUNK_BYTES),
                volume_db: None,
            },
            output: OutputSettings {
                path: PathBuf::from("output.aac"),
            },
            mix: None,
            logging: Some(LoggingSettings::default()),
        }
    }

    /// Validate and convert to a job.
    pub fn into_job(self) -> Result<TranscodeJob> {
        let mode = self.codec.mode;

        let defaults = CodecConfig::default();
        let rate_control = match (self.codec.quality, self.codec.bit_rate) {
            (Some(q), _) => RateControl::Quality(q),
            (None, Some(bps)) => RateControl::BitRate(bps),
            (None, None) => defaults.rate_control,
        };
        let codec = CodecConfig {
            sample_rate: self.codec.sample_rate,
            channels: self.codec.channels,
            profile: self.codec.profile.unwrap_or(defaults.profile),
            rate_control,
            poll_interval_ms: self.codec.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            auto_start: false,
        };
        codec.validate()?;

        if self.input.paths.is_empty() {
            return Err(TranscodeError::Config("input.paths is empty".into()));
        }
        if mode == CodecMode::Decode && self.input.paths.len() > 1 {
            return Err(TranscodeError::Config(
                "decode takes exactly one input file".into(),
            ));
        }

        let bits = self.input.bit_depth.unwrap_or(16);
        let bit_depth = BitDepth::from_bits(bits).ok_or_else(|| {
            TranscodeError::Config(format!("input.bit_depth must be 8 or 16, got {}", bits))
        })?;
        let chunk_bytes = self.input.chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES);
        if chunk_bytes == 0 {
            return Err(TranscodeError::Config("input.chunk_bytes must be non-zero".into()));
        }
        let input = InputSpec {
            sample_rate: self.input.sample_rate.unwrap_or(codec.sample_rate),
            channels: self.input.channels.unwrap_or(codec.channels),
            paths: self.input.paths,
            bit_depth,
            chunk_bytes,
            volume_db: self.input.volume_db,
        };
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(TranscodeError::Config(
                "input sample_rate and channels must be non-zero".into(),
            ));
        }

        let mix = match self.mix {
            Some(mix) if mode == CodecMode::Encode => {
                check_weights(&mix, input.paths.len())?;
                Some(mix)
            }
            Some(_) => {
                return Err(TranscodeError::Config(
                    "[mix] only applies to encode jobs".into(),
                ))
            }
            None if input.paths.len() > 1 => {
                return Err(TranscodeError::Config(
                    "several inputs need a [mix] section".into(),
                ))
            }
            None => None,
        };

        Ok(TranscodeJob {
            mode,
            codec,
            input,
            output: self.output.path,
            mix,
            logging: self.logging.unwrap_or_default(),
        })
    }
}

/// A weighted mix needs one weight per input.
fn check_weights(mix: &MixStrategy, tracks: usize) -> Result<()> {
    match mix {
        MixStrategy::Weight(weights) if weights.len() != tracks => Err(TranscodeError::Config(
            format!("mix.weights has {} entries for {} inputs", weights.len(), tracks),
        )),
        _ => Ok(()),
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
