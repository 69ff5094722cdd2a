use std::borrow::Cow;

use crate::config::CodecConfig;
use crate::error::{Result, TranscodeError};
use crate::pcm::{resample_interleaved, AudioMixer, BitDepth, MixStrategy, PcmChunk, Track};

/// Converts chunks to the sample rate and channel count an encoder expects.
///
/// Order of operations: 8-bit input is widened to 16-bit, every channel is
/// resampled on its own, then the channel count is adjusted. Reducing to
/// mono keeps the left channel; mono to stereo duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkNormalizer {
    target_rate: u32,
    target_channels: u16,
}

impl ChunkNormalizer {
    pub fn new(target_rate: u32, target_channels: u16) -> Result<Self> {
        if target_rate == 0 {
            return Err(TranscodeError::Config(
                "target sample rate must be non-zero".into(),
            ));
        }
        if !(1..=2).contains(&target_channels) {
            return Err(TranscodeError::Config(format!(
                "target layout must be mono or stereo, got {} channels",
                target_channels
            )));
        }
        Ok(Self {
            target_rate,
            target_channels,
        })
    }

    /// Normalizer producing the input layout of an encoder with `config`.
    pub fn for_config(config: &CodecConfig) -> Result<Self> {
        Self::new(config.sample_rate, config.channels)
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn target_channels(&self) -> u16 {
        self.target_channels
    }

    pub fn normalize(&self, chunk: &PcmChunk) -> Result<PcmChunk> {
        let pcm16 = widen_to_16_bit(chunk);
        let channels = chunk.channels();
        let resampled = resample_interleaved(
            &pcm16,
            channels,
            chunk.sample_rate(),
            self.target_rate,
        )?;
        let resampled = PcmChunk::pcm16(resampled.into_owned(), self.target_rate, channels)?;

        match (channels, self.target_channels) {
            (from, to) if from == to => Ok(resampled),
            (1, _) => resampled.to_stereo_duplicated(),
            (_, 1) => resampled.to_left(),
            _ => resampled.to_stereo_reduced(),
        }
    }
}

/// 16-bit view of a chunk. Unsigned 8-bit samples are re-centred and scaled.
pub fn widen_to_16_bit(chunk: &PcmChunk) -> Cow<'_, [u8]> {
    match chunk.bit_depth() {
        BitDepth::Bits16 => Cow::Borrowed(chunk.data().as_ref()),
        BitDepth::Bits8 => {
            let mut out = Vec::with_capacity(chunk.len() * 2);
            for &b in chunk.data().iter() {
                let sample = ((b as i16) - 128) << 8;
                out.extend_from_slice(&sample.to_le_bytes());
            }
            Cow::Owned(out)
        }
    }
}

/// Normalize every chunk, then mix them with `strategy`.
///
/// Chunks must describe the same duration; after normalization their byte
/// lengths have to match exactly or the mixer rejects them.
pub fn mix_chunks(
    normalizer: &ChunkNormalizer,
    chunks: &[PcmChunk],
    strategy: MixStrategy,
) -> Result<PcmChunk> {
    let tracks = chunks
        .iter()
        .map(|c| normalizer.normalize(c).and_then(Track::try_from))
        .collect::<Result<Vec<_>>>()?;
    let mixed = AudioMixer::new(strategy).mix_tracks(&tracks)?;
    Ok(mixed.into_chunk())
}
