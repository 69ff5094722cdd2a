//! Per-pipeline codec session

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adts::{audio_specific_config, encode_header, AacProfile, ADTS_HEADER_LEN};
use crate::config::{CodecConfig, RateControl};
use crate::error::Result;

/// Samples per channel in one AAC access unit
pub const SAMPLES_PER_ACCESS_UNIT: u64 = 1024;

/// Direction of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// Raw PCM in, ADTS-framed AAC out
    Encode,
    /// Raw AAC access units in, raw PCM out
    Decode,
}

impl std::fmt::Display for CodecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecMode::Encode => f.write_str("encode"),
            CodecMode::Decode => f.write_str("decode"),
        }
    }
}

/// Stream parameters fixed at prepare time plus the running timestamp.
///
/// Shared by the feeder (which advances the timestamp) and the drainer
/// (which frames output with the header fields).
#[derive(Debug)]
pub struct CodecSession {
    id: Uuid,
    mode: CodecMode,
    sample_rate: u32,
    sampling_index: u8,
    profile: AacProfile,
    channels: u16,
    rate_control: RateControl,
    pts_us: AtomicI64,
}

impl CodecSession {
    pub fn new(mode: CodecMode, config: &CodecConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            sample_rate: config.sample_rate,
            sampling_index: config.sampling_index(),
            profile: config.profile,
            channels: config.channels,
            rate_control: config.rate_control,
            pts_us: AtomicI64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sampling_index(&self) -> u8 {
        self.sampling_index
    }

    pub fn profile(&self) -> AacProfile {
        self.profile
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn rate_control(&self) -> RateControl {
        self.rate_control
    }

    /// Timestamp the next input buffer will carry
    pub fn pts_us(&self) -> i64 {
        self.pts_us.load(Ordering::Acquire)
    }

    /// Claim the timestamp for one input chunk of `len` bytes and move the
    /// clock past it.
    ///
    /// Encode input is 16-bit PCM, so the chunk lasts
    /// `len / (channels * 2)` frames. Decode input is one access unit of
    /// [`SAMPLES_PER_ACCESS_UNIT`] frames whatever its byte size.
    pub fn advance(&self, len: usize) -> i64 {
        let frames = match self.mode {
            CodecMode::Encode => len as u64 / (self.channels as u64 * 2),
            CodecMode::Decode => SAMPLES_PER_ACCESS_UNIT,
        };
        let step = (frames * 1_000_000 / self.sample_rate as u64) as i64;
        self.pts_us.fetch_add(step, Ordering::AcqRel)
    }

    /// Decoder configuration bytes (`csd-0`)
    pub fn audio_specific_config(&self) -> [u8; 2] {
        audio_specific_config(self.profile, self.sampling_index, self.channels as u8)
    }

    /// Prefix one raw AAC frame with its ADTS header.
    pub fn frame(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let header = encode_header(
            payload.len(),
            self.sampling_index,
            self.profile,
            self.channels as u8,
        )?;
        let mut out = Vec::with_capacity(ADTS_HEADER_LEN + payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        Ok(out)
    }
}
