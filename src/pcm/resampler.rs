//! Linear-interpolation sample-rate conversion for 16-bit PCM
//!
//! The converter treats its input as one flat run of samples. Interleaved
//! multi-channel material should go through [`resample_interleaved`], which
//! converts each channel separately.

use std::borrow::Cow;

use crate::error::{Result, TranscodeError};
use crate::pcm::chunk::{read_i16_le, write_i16_le};

/// Normalisation factor between i16 samples and `[-1, 1)`
const SCALE: f64 = 32768.0;

/// Convert little-endian 16-bit PCM from `input_rate` to `output_rate`.
///
/// Equal rates return the input untouched. The output holds
/// `floor(samples * output_rate / input_rate)` samples; each one is a
/// straight-line interpolation between its two nearest source samples,
/// truncated (not rounded) back to 16 bits.
pub fn resample(pcm16: &[u8], input_rate: u32, output_rate: u32) -> Result<Cow<'_, [u8]>> {
    if input_rate == 0 || output_rate == 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "sample rates must be non-zero ({} -> {})",
            input_rate, output_rate
        )));
    }
    if input_rate == output_rate {
        return Ok(Cow::Borrowed(pcm16));
    }
    if pcm16.len() % 2 != 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "16-bit PCM must have an even byte length, got {}",
            pcm16.len()
        )));
    }

    let input = read_i16_le(pcm16);
    let len = input.len();
    if len == 0 {
        return Ok(Cow::Owned(Vec::new()));
    }

    let out_len = (len as u64 * output_rate as u64 / input_rate as u64) as usize;
    if out_len == 0 {
        return Err(TranscodeError::EmptyResampleTarget {
            samples: len,
            input_rate,
            output_rate,
        });
    }

    let source: Vec<f64> = input.iter().map(|&s| s as f64 / SCALE).collect();

    // A single output sample has no spacing to divide by; it lands on S[0].
    let step = if out_len > 1 {
        (len as f64 - 1.0) / (out_len as f64 - 1.0)
    } else {
        0.0
    };

    let mut output = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let pos = step * n as f64;
        let mut floor = pos.floor() as usize;
        let mut ceil = pos.ceil() as usize;

        if ceil >= len && floor < len {
            ceil = floor;
        } else if ceil >= len {
            ceil = len - 1;
            floor = len - 1;
        }

        let value = source[floor] + (pos - floor as f64) * (source[ceil] - source[floor]);
        output.push((value * SCALE) as i32 as i16);
    }

    Ok(Cow::Owned(write_i16_le(&output)))
}

/// Resample interleaved 16-bit PCM one channel at a time.
///
/// For `channels == 1` this is exactly [`resample`].
pub fn resample_interleaved(
    pcm16: &[u8],
    channels: u16,
    input_rate: u32,
    output_rate: u32,
) -> Result<Cow<'_, [u8]>> {
    if channels <= 1 {
        return resample(pcm16, input_rate, output_rate);
    }
    if input_rate == output_rate {
        return Ok(Cow::Borrowed(pcm16));
    }

    let channels = channels as usize;
    let frame = channels * 2;
    if pcm16.len() % frame != 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "{} bytes is not a whole number of {}-byte frames",
            pcm16.len(),
            frame
        )));
    }

    let mut planes: Vec<Vec<u8>> = vec![Vec::with_capacity(pcm16.len() / channels); channels];
    for frame_bytes in pcm16.chunks_exact(frame) {
        for (ch, plane) in planes.iter_mut().enumerate() {
            plane.extend_from_slice(&frame_bytes[ch * 2..ch * 2 + 2]);
        }
    }

    let converted = planes
        .iter()
        .map(|plane| resample(plane, input_rate, output_rate).map(Cow::into_owned))
        .collect::<Result<Vec<_>>>()?;

    // Every plane had the same length, so every output plane does too.
    let out_frames = converted[0].len() / 2;
    let mut out = Vec::with_capacity(out_frames * frame);
    for i in 0..out_frames {
        for plane in &converted {
            out.extend_from_slice(&plane[i * 2..i * 2 + 2]);
        }
    }
    Ok(Cow::Owned(out))
}
