//! Decibel gain for 16-bit PCM

use crate::error::{Result, TranscodeError};
use crate::pcm::chunk::{read_i16_le, write_i16_le};

/// Loudest sample value the gain stage will emit, in either direction
pub const GAIN_CEILING: i32 = 0x7F00;

/// Linear amplitude factor for a gain of `db` decibels.
pub fn db_to_gain(db: i32) -> f32 {
    10f64.powf(db as f64 / 20.0) as f32
}

/// Raise or lower the level of 16-bit PCM by `db` decibels.
///
/// Scaled samples are clamped to `±GAIN_CEILING` so boosting cannot wrap.
pub fn adjust_volume(pcm16: &[u8], db: i32) -> Result<Vec<u8>> {
    if pcm16.len() % 2 != 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "16-bit PCM must have an even byte length, got {}",
            pcm16.len()
        )));
    }
    let gain = db_to_gain(db);
    let scaled: Vec<i16> = read_i16_le(pcm16)
        .into_iter()
        .map(|s| ((s as f32 * gain) as i32).clamp(-GAIN_CEILING, GAIN_CEILING) as i16)
        .collect();
    Ok(write_i16_le(&scaled))
}
