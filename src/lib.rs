//! Streaming audio transcoding core
//!
//! - PCM transforms: resampling, channel extraction and duplication,
//!   multi-track mixing, decibel gain ([`pcm`])
//! - ADTS framing for raw AAC ([`adts`])
//! - Threaded AAC encode/decode pipelines over pluggable codec devices
//!   ([`codec`])
//! - Chunk normalization ahead of the encoder ([`transcode`])
//! - TOML job files and a job runner ([`config_file`], [`runner`])

pub mod adts;
pub mod codec;
pub mod config;
pub mod config_file;
pub mod error;
pub mod pcm;
pub mod runner;
pub mod stats;
pub mod transcode;

#[cfg(test)]
mod integration;

pub use codec::{CodecPipeline, PipelineEvent, PipelineListener, PipelineState};
pub use config::{CodecConfig, RateControl};
pub use error::{CodecError, Result, TranscodeError};
pub use stats::StatsSnapshot;
