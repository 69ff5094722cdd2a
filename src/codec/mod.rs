//! AAC codec sessions
//!
//! - [`device`]: the non-blocking codec device contract
//! - [`pipeline`]: feeder/drainer workers around one device
//! - [`queue`]: the job queue between callers and the feeder
//! - [`session`]: stream parameters and timestamps
//! - [`symphonia_decoder`]: software AAC decoder
//! - `ffmpeg_encoder`: FFmpeg AAC encoder (feature `ffmpeg`)

pub mod device;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_encoder;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod symphonia_decoder;

pub use device::{CodecDevice, InputBuffer, OutputBuffer};
pub use pipeline::{CodecPipeline, PipelineEvent, PipelineListener, PipelineState};
pub use queue::JobQueue;
pub use session::{CodecMode, CodecSession};
pub use symphonia_decoder::SymphoniaAacDecoder;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_encoder::FfmpegAacEncoder;

use crate::error::Result;

/// The device `CodecPipeline::prepare` uses for a session's mode.
pub fn default_device(session: &CodecSession) -> Result<Box<dyn CodecDevice>> {
    match session.mode() {
        CodecMode::Decode => Ok(Box::new(SymphoniaAacDecoder::open(session)?)),
        CodecMode::Encode => open_encoder(session),
    }
}

#[cfg(feature = "ffmpeg")]
fn open_encoder(session: &CodecSession) -> Result<Box<dyn CodecDevice>> {
    Ok(Box::new(FfmpegAacEncoder::open(session)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_encoder(_session: &CodecSession) -> Result<Box<dyn CodecDevice>> {
    Err(crate::error::CodecError::Unavailable(
        "AAC encoding requires the `ffmpeg` feature".into(),
    )
    .into())
}
