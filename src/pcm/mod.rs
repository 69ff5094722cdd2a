//! Raw PCM processing
//!
//! Pure, synchronous transforms on interleaved integer PCM:
//! - Chunk and track types with layout validation
//! - Linear-interpolation resampling
//! - Channel extraction, stereo reduction and mono duplication
//! - Multi-track mixing
//! - Decibel gain

pub mod channels;
pub mod chunk;
pub mod mixer;
pub mod resampler;
pub mod volume;

pub use channels::{extract_left, extract_right, mono_to_stereo, reduce_to_stereo};
pub use chunk::{BitDepth, PcmChunk, Track};
pub use mixer::{AudioMixer, MixStrategy};
pub use resampler::{resample, resample_interleaved};
pub use volume::adjust_volume;
