//! PCM preparation ahead of the encoder
//!
//! Brings arbitrary 8/16-bit PCM chunks to the encoder's input layout
//! (resample, then channel transform) and mixes several prepared tracks
//! into one.

pub mod normalizer;

pub use normalizer::{mix_chunks, widen_to_16_bit, ChunkNormalizer};
