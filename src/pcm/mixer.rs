//! Multi-track PCM mixer
//!
//! Combines equal-length 16-bit tracks sample by sample. None of the
//! strategies clip: sums are computed in 32 bits and then wrapped back to
//! 16 bits, so loud inputs can fold over. Callers that need headroom should
//! attenuate first (see [`crate::pcm::volume`]) or use `Average`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TranscodeError};
use crate::pcm::chunk::{read_i16_le, write_i16_le, PcmChunk, Track};

/// How samples from different tracks are combined
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "weights", rename_all = "lowercase")]
pub enum MixStrategy {
    /// `max + min` across tracks when they differ, else the shared value
    #[default]
    Extreme,
    /// Plain sum
    Add,
    /// Sum divided by the track count
    Average,
    /// Sum of `sample * weight`, one weight per track
    Weight(Vec<f32>),
}

/// Mixer bound to one strategy
#[derive(Debug, Clone, Default)]
pub struct AudioMixer {
    strategy: MixStrategy,
}

impl AudioMixer {
    pub fn new(strategy: MixStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &MixStrategy {
        &self.strategy
    }

    /// Mix `track_count` raw 16-bit tracks into one.
    ///
    /// Fails without producing output when the count does not match, the
    /// tracks differ in length, or a weighted mix has the wrong number of
    /// weights.
    pub fn mix<T: AsRef<[u8]>>(&self, track_count: usize, tracks: &[T]) -> Result<Vec<u8>> {
        if tracks.is_empty() {
            return Err(TranscodeError::InvalidInput("no tracks to mix".into()));
        }
        if track_count != tracks.len() {
            return Err(TranscodeError::TrackCountMismatch {
                expected: track_count,
                actual: tracks.len(),
            });
        }

        let expected = tracks[0].as_ref().len();
        for (index, track) in tracks.iter().enumerate().skip(1) {
            let actual = track.as_ref().len();
            if actual != expected {
                tracing::debug!(index, actual, expected, "mixer: track length differs");
                return Err(TranscodeError::TrackLengthMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }
        if expected % 2 != 0 {
            return Err(TranscodeError::InvalidInput(format!(
                "16-bit tracks must have an even byte length, got {}",
                expected
            )));
        }
        if let MixStrategy::Weight(weights) = &self.strategy {
            if weights.len() != track_count {
                return Err(TranscodeError::WeightCountMismatch {
                    weights: weights.len(),
                    tracks: track_count,
                });
            }
        }

        let rows: Vec<Vec<i16>> = tracks.iter().map(|t| read_i16_le(t.as_ref())).collect();
        let columns = expected / 2;

        let mixed: Vec<i16> = (0..columns)
            .map(|column| self.mix_column(&rows, column))
            .collect();

        Ok(write_i16_le(&mixed))
    }

    /// Mix typed tracks; the result keeps the first track's layout.
    pub fn mix_tracks(&self, tracks: &[Track]) -> Result<Track> {
        let first = tracks
            .first()
            .ok_or_else(|| TranscodeError::InvalidInput("no tracks to mix".into()))?
            .chunk();
        let raw: Vec<&[u8]> = tracks.iter().map(Track::as_bytes).collect();
        let mixed = self.mix(tracks.len(), &raw)?;
        let chunk = PcmChunk::new(mixed, first.sample_rate(), first.bit_depth(), first.channels())?;
        Track::try_from(chunk)
    }

    fn mix_column(&self, rows: &[Vec<i16>], column: usize) -> i16 {
        let samples = rows.iter().map(|row| row[column] as i32);
        match &self.strategy {
            MixStrategy::Extreme => {
                let max = samples.clone().max().unwrap_or(0);
                let min = samples.min().unwrap_or(0);
                if max != min {
                    (max + min) as i16
                } else {
                    max as i16
                }
            }
            MixStrategy::Add => samples.sum::<i32>() as i16,
            MixStrategy::Average => (samples.sum::<i32>() / rows.len() as i32) as i16,
            MixStrategy::Weight(weights) => {
                // The accumulator is truncated back to an integer after every
                // weighted term, not once at the end.
                let mut acc: i32 = 0;
                for (sample, weight) in samples.zip(weights) {
                    acc = (acc as f32 + sample as f32 * weight) as i32;
                }
                acc as i16
            }
        }
    }
}
