//! ADTS framing for raw AAC
//!
//! - 7-byte ADTS header encoding and parsing (ISO/IEC 13818-7, no CRC)
//! - Sampling-frequency index table
//! - AudioSpecificConfig bytes for decoders fed ADTS-stripped input
//! - Splitting an ADTS byte stream into access units

pub mod header;
pub mod reader;

use serde::{Deserialize, Serialize};

pub use header::{encode_header, parse_header, AdtsHeader, ADTS_HEADER_LEN, MAX_FRAME_LENGTH};
pub use reader::AdtsFrames;

/// Standard AAC sampling rates, indexed by their ADTS sampling index
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Index used when a sample rate is not in [`SAMPLE_RATES`] (44100 Hz)
pub const DEFAULT_SAMPLING_INDEX: u8 = 4;

/// AAC audio object type carried in the ADTS profile field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AacProfile {
    /// AAC Main
    Main,
    /// AAC Low Complexity
    #[default]
    Lc,
    /// AAC Scalable Sample Rate
    Ssr,
}

impl AacProfile {
    /// MPEG-4 audio object type (1, 2 or 3)
    pub fn object_type(self) -> u8 {
        match self {
            AacProfile::Main => 1,
            AacProfile::Lc => 2,
            AacProfile::Ssr => 3,
        }
    }

    /// Value of the 2-bit ADTS profile field (object type minus one)
    pub fn adts_bits(self) -> u8 {
        self.object_type() - 1
    }

    pub fn from_adts_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(AacProfile::Main),
            1 => Some(AacProfile::Lc),
            2 => Some(AacProfile::Ssr),
            _ => None,
        }
    }

    /// RFC 6381 codec string, e.g. `mp4a.40.2` for LC
    pub fn codec_string(self) -> &'static str {
        match self {
            AacProfile::Main => "mp4a.40.1",
            AacProfile::Lc => "mp4a.40.2",
            AacProfile::Ssr => "mp4a.40.3",
        }
    }
}

impl std::fmt::Display for AacProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AacProfile::Main => "Main",
            AacProfile::Lc => "LC",
            AacProfile::Ssr => "SSR",
        };
        f.write_str(name)
    }
}

/// ADTS sampling index for `rate`, if it is one of the 13 standard rates.
pub fn sampling_frequency_index(rate: u32) -> Option<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == rate)
        .map(|i| i as u8)
}

/// ADTS sampling index for `rate`, falling back to
/// [`DEFAULT_SAMPLING_INDEX`] for non-standard rates.
///
/// The fallback means the header advertises 44100 Hz even though the
/// payload was produced at `rate`; a warning is logged when it happens.
pub fn sampling_index_or_default(rate: u32) -> u8 {
    match sampling_frequency_index(rate) {
        Some(index) => index,
        None => {
            tracing::warn!(
                rate,
                fallback_index = DEFAULT_SAMPLING_INDEX,
                "unsupported AAC sample rate, advertising 44100 Hz"
            );
            DEFAULT_SAMPLING_INDEX
        }
    }
}

/// Sample rate for an ADTS sampling index.
pub fn sample_rate_for_index(index: u8) -> Option<u32> {
    SAMPLE_RATES.get(index as usize).copied()
}

/// Two-byte AudioSpecificConfig (`csd-0`):
/// object type (5 bits) | sampling index (4) | channel config (4) | 000.
pub fn audio_specific_config(profile: AacProfile, sampling_index: u8, channels: u8) -> [u8; 2] {
    let object_type = profile.object_type();
    [
        (object_type << 3) | ((sampling_index & 0x0F) >> 1),
        ((sampling_index & 0x01) << 7) | ((channels & 0x0F) << 3),
    ]
}
