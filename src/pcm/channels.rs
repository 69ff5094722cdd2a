//! Interleaved channel extraction and duplication
//!
//! Frame layouts handled here:
//!
//! ```text
//! 8-bit stereo   L R L R ...
//! 8-bit 3ch      L R C L R C ...
//! 16-bit stereo  Ll Lh Rl Rh Ll Lh Rl Rh ...
//! 16-bit 3ch     Ll Lh Rl Rh Cl Ch Ll Lh ...
//! ```
//!
//! "Right" always means channel index 1, whatever the channel count. Layouts
//! that put the right speaker elsewhere are not remapped.

use std::borrow::Cow;

use bytes::Bytes;

use crate::error::{Result, TranscodeError};
use crate::pcm::chunk::{frame_size, BitDepth, PcmChunk};

fn check_frames(chunk: &[u8], channels: u16, bit_depth: BitDepth) -> Result<usize> {
    if channels == 0 {
        return Err(TranscodeError::InvalidInput(
            "channel count must be at least 1".into(),
        ));
    }
    let frame = frame_size(channels, bit_depth);
    if chunk.len() % frame != 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "{} bytes is not a whole number of {}-byte frames",
            chunk.len(),
            frame
        )));
    }
    Ok(frame)
}

/// Copy one channel's bytes out of every frame.
fn extract_channel(chunk: &[u8], frame: usize, bytes_per_sample: usize, channel: usize) -> Vec<u8> {
    let offset = channel * bytes_per_sample;
    let mut out = Vec::with_capacity(chunk.len() / frame * bytes_per_sample);
    for f in chunk.chunks_exact(frame) {
        out.extend_from_slice(&f[offset..offset + bytes_per_sample]);
    }
    out
}

/// Take the first channel of every frame. Mono input is returned as is.
pub fn extract_left(chunk: &[u8], channels: u16, bit_depth: BitDepth) -> Result<Cow<'_, [u8]>> {
    let frame = check_frames(chunk, channels, bit_depth)?;
    if channels == 1 {
        return Ok(Cow::Borrowed(chunk));
    }
    Ok(Cow::Owned(extract_channel(
        chunk,
        frame,
        bit_depth.bytes_per_sample(),
        0,
    )))
}

/// Take channel index 1 of every frame. Mono input is returned as is.
pub fn extract_right(chunk: &[u8], channels: u16, bit_depth: BitDepth) -> Result<Cow<'_, [u8]>> {
    let frame = check_frames(chunk, channels, bit_depth)?;
    if channels == 1 {
        return Ok(Cow::Borrowed(chunk));
    }
    Ok(Cow::Owned(extract_channel(
        chunk,
        frame,
        bit_depth.bytes_per_sample(),
        1,
    )))
}

/// Keep the first two channels of every frame and drop the rest.
pub fn reduce_to_stereo(chunk: &[u8], channels: u16, bit_depth: BitDepth) -> Result<Cow<'_, [u8]>> {
    let frame = check_frames(chunk, channels, bit_depth)?;
    if channels <= 2 {
        return Ok(Cow::Borrowed(chunk));
    }
    let keep = 2 * bit_depth.bytes_per_sample();
    let mut out = Vec::with_capacity(chunk.len() / channels as usize * 2);
    for f in chunk.chunks_exact(frame) {
        out.extend_from_slice(&f[..keep]);
    }
    Ok(Cow::Owned(out))
}

/// Duplicate every mono sample into a left/right pair.
pub fn mono_to_stereo(chunk: &[u8], bit_depth: BitDepth) -> Result<Vec<u8>> {
    let width = bit_depth.bytes_per_sample();
    check_frames(chunk, 1, bit_depth)?;
    let mut out = Vec::with_capacity(chunk.len() * 2);
    for sample in chunk.chunks_exact(width) {
        out.extend_from_slice(sample);
        out.extend_from_slice(sample);
    }
    Ok(out)
}

fn to_bytes(data: Cow<'_, [u8]>, original: &Bytes) -> Bytes {
    match data {
        Cow::Borrowed(_) => original.clone(),
        Cow::Owned(v) => Bytes::from(v),
    }
}

impl PcmChunk {
    /// Left channel as a mono chunk.
    pub fn to_left(&self) -> Result<PcmChunk> {
        let data = extract_left(self.data(), self.channels(), self.bit_depth())?;
        Ok(self.with_data(to_bytes(data, self.data()), 1))
    }

    /// Channel index 1 as a mono chunk.
    pub fn to_right(&self) -> Result<PcmChunk> {
        let data = extract_right(self.data(), self.channels(), self.bit_depth())?;
        Ok(self.with_data(to_bytes(data, self.data()), 1))
    }

    /// First two channels; chunks with one or two channels are unchanged.
    pub fn to_stereo_reduced(&self) -> Result<PcmChunk> {
        let data = reduce_to_stereo(self.data(), self.channels(), self.bit_depth())?;
        let channels = self.channels().min(2);
        Ok(self.with_data(to_bytes(data, self.data()), channels))
    }

    /// Mono chunk duplicated to stereo.
    pub fn to_stereo_duplicated(&self) -> Result<PcmChunk> {
        if self.channels() != 1 {
            return Err(TranscodeError::InvalidInput(format!(
                "mono to stereo needs a 1-channel chunk, got {} channels",
                self.channels()
            )));
        }
        let data = mono_to_stereo(self.data(), self.bit_depth())?;
        Ok(self.with_data(Bytes::from(data), 2))
    }
}
