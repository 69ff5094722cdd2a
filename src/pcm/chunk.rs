//! PCM chunk and mixer track types

use bytes::Bytes;

use crate::error::{Result, TranscodeError};

/// Sample width of interleaved integer PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// Unsigned 8-bit samples
    Bits8,
    /// Signed little-endian 16-bit samples
    Bits16,
}

impl BitDepth {
    /// Bytes occupied by one sample of one channel
    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Bits8 => 1,
            BitDepth::Bits16 => 2,
        }
    }

    /// Map a bit count (8 or 16) to a depth.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::Bits8),
            16 => Some(BitDepth::Bits16),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Bits8 => 8,
            BitDepth::Bits16 => 16,
        }
    }
}

/// A block of interleaved PCM audio together with its layout.
///
/// The byte length is always a whole number of frames
/// (`channels * bytes_per_sample`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    data: Bytes,
    sample_rate: u32,
    bit_depth: BitDepth,
    channels: u16,
}

impl PcmChunk {
    /// Wrap `data` after checking it holds whole frames.
    pub fn new(
        data: impl Into<Bytes>,
        sample_rate: u32,
        bit_depth: BitDepth,
        channels: u16,
    ) -> Result<Self> {
        let data = data.into();
        if channels == 0 {
            return Err(TranscodeError::InvalidInput(
                "channel count must be at least 1".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(TranscodeError::InvalidInput(
                "sample rate must be non-zero".into(),
            ));
        }
        let frame = frame_size(channels, bit_depth);
        if data.len() % frame != 0 {
            return Err(TranscodeError::InvalidInput(format!(
                "{} bytes is not a whole number of {}-byte frames",
                data.len(),
                frame
            )));
        }
        Ok(Self {
            data,
            sample_rate,
            bit_depth,
            channels,
        })
    }

    /// Shorthand for 16-bit chunks.
    pub fn pcm16(data: impl Into<Bytes>, sample_rate: u32, channels: u16) -> Result<Self> {
        Self::new(data, sample_rate, BitDepth::Bits16, channels)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of interleaved frames in the chunk
    pub fn frames(&self) -> usize {
        self.data.len() / frame_size(self.channels, self.bit_depth)
    }

    /// Playback duration in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.frames() as u64 * 1_000_000 / self.sample_rate as u64
    }

    /// Same layout, different payload. The caller guarantees `data` matches
    /// the new channel count.
    pub(crate) fn with_data(&self, data: Bytes, channels: u16) -> Self {
        Self {
            data,
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
            channels,
        }
    }
}

/// Size in bytes of one interleaved frame
pub fn frame_size(channels: u16, bit_depth: BitDepth) -> usize {
    channels as usize * bit_depth.bytes_per_sample()
}

/// A 16-bit PCM chunk used as mixer input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track(PcmChunk);

impl Track {
    pub fn chunk(&self) -> &PcmChunk {
        &self.0
    }

    pub fn into_chunk(self) -> PcmChunk {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.data()
    }
}

impl TryFrom<PcmChunk> for Track {
    type Error = TranscodeError;

    fn try_from(chunk: PcmChunk) -> Result<Self> {
        if chunk.bit_depth() != BitDepth::Bits16 {
            return Err(TranscodeError::InvalidInput(
                "mixer tracks must be 16-bit PCM".into(),
            ));
        }
        Ok(Track(chunk))
    }
}

/// Decode little-endian 16-bit samples. A trailing odd byte is ignored.
pub fn read_i16_le(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Encode samples as little-endian 16-bit PCM.
pub fn write_i16_le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
