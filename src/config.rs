//! Codec configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adts::{sampling_index_or_default, AacProfile};
use crate::error::{Result, TranscodeError};

/// Highest channel configuration an ADTS header can signal
pub const MAX_CHANNELS: u16 = 7;

/// Encoder rate control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Target bit rate in bits per second
    BitRate(u32),
    /// Encoder-specific VBR quality level
    Quality(u32),
}

impl Default for RateControl {
    fn default() -> Self {
        RateControl::BitRate(96_000)
    }
}

/// Parameters shared by the encode and decode pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Sample rate of the PCM side, in Hz
    pub sample_rate: u32,

    /// Channel count of the PCM side
    pub channels: u16,

    /// AAC object type
    pub profile: AacProfile,

    /// Encoder rate control (ignored when decoding)
    pub rate_control: RateControl,

    /// Upper bound on how long a worker waits between device polls
    pub poll_interval_ms: u64,

    /// Start the workers as soon as `prepare` succeeds
    pub auto_start: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            profile: AacProfile::Lc,
            rate_control: RateControl::default(),
            poll_interval_ms: 16,
            auto_start: false,
        }
    }
}

impl CodecConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// ADTS sampling index for the configured rate (44100 Hz fallback).
    pub fn sampling_index(&self) -> u8 {
        sampling_index_or_default(self.sample_rate)
    }

    /// Check the values a pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TranscodeError::Config("sample_rate must be non-zero".into()));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(TranscodeError::Config(format!(
                "channels must be between 1 and {}, got {}",
                MAX_CHANNELS, self.channels
            )));
        }
        match self.rate_control {
            RateControl::BitRate(0) => {
                return Err(TranscodeError::Config("bit rate must be non-zero".into()))
            }
            RateControl::BitRate(_) | RateControl::Quality(_) => {}
        }
        if self.poll_interval_ms == 0 {
            return Err(TranscodeError::Config(
                "poll_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodecConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.profile, AacProfile::Lc);
        assert_eq!(config.rate_control, RateControl::BitRate(96_000));
        assert_eq!(config.poll_interval(), Duration::from_millis(16));
        assert!(!config.auto_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sampling_index() {
        let config = CodecConfig {
            sample_rate: 44100,
            ..Default::default()
        };
        assert_eq!(config.sampling_index(), 4);
        let config = CodecConfig {
            sample_rate: 22000,
            ..Default::default()
        };
        assert_eq!(config.sampling_index(), 4);
        assert_eq!(CodecConfig::default().sampling_index(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            CodecConfig {
                sample_rate: 0,
                ..Default::default()
            },
            CodecConfig {
                channels: 0,
                ..Default::default()
            },
            CodecConfig {
                channels: 8,
                ..Default::default()
            },
            CodecConfig {
                rate_control: RateControl::BitRate(0),
                ..Default::default()
            },
            CodecConfig {
                poll_interval_ms: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(TranscodeError::Config(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CodecConfig = toml::from_str(
            r#"
            sample_rate = 44100
            rate_control = { quality = 4 }
            "#,
        )
        .unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.rate_control, RateControl::Quality(4));
    }
}
