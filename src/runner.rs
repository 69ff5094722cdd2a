//! Runs one [`TranscodeJob`] from input files to an output file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn};

use crate::adts::AdtsFrames;
use crate::codec::{
    default_device, CodecDevice, CodecMode, CodecPipeline, CodecSession, PipelineEvent,
};
use crate::config_file::{InputSpec, TranscodeJob};
use crate::error::{CodecError, Result, TranscodeError};
use crate::pcm::chunk::frame_size;
use crate::pcm::{adjust_volume, PcmChunk};
use crate::stats::StatsSnapshot;
use crate::transcode::{mix_chunks, ChunkNormalizer};

/// How long to wait for the workers to exit once the release event arrived
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `job` on the default codec devices.
pub fn run_job(job: &TranscodeJob) -> Result<StatsSnapshot> {
    run_job_with(job, default_device)
}

/// Run `job` on the device built by `factory`.
pub fn run_job_with<F>(job: &TranscodeJob, factory: F) -> Result<StatsSnapshot>
where
    F: FnOnce(&CodecSession) -> Result<Box<dyn CodecDevice>>,
{
    match job.mode {
        CodecMode::Encode => encode(job, factory),
        CodecMode::Decode => decode(job, factory),
    }
}

fn encode<F>(job: &TranscodeJob, factory: F) -> Result<StatsSnapshot>
where
    F: FnOnce(&CodecSession) -> Result<Box<dyn CodecDevice>>,
{
    let tracks = load_tracks(&job.input)?;
    if tracks.is_empty() {
        return Err(TranscodeError::InvalidInput("no input files".into()));
    }
    let normalizer = ChunkNormalizer::for_config(&job.codec)?;

    let (tx, rx) = unbounded_channel();
    let pipeline = CodecPipeline::new(CodecMode::Encode, job.codec.clone(), Arc::new(tx));
    pipeline.prepare_with(factory)?;
    pipeline.start()?;

    let frame = frame_size(job.input.channels, job.input.bit_depth);
    let step = (job.input.chunk_bytes / frame).max(1) * frame;
    let total = tracks[0].len();
    info!(
        inputs = tracks.len(),
        bytes = total,
        chunk_bytes = step,
        output = %job.output.display(),
        "encoding"
    );

    let mut failure = None;
    for offset in (0..total).step_by(step) {
        let end = (offset + step).min(total);
        let data = match prepare_chunk(job, &normalizer, &tracks, offset, end) {
            Ok(Some(data)) => data,
            Ok(None) => continue,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        if let Err(e) = pipeline.submit(data) {
            warn!(error = %e, offset, pending = pipeline.pending(), "stopped submitting input");
            break;
        }
    }
    pipeline.request_stop();

    // Whatever was submitted is still encoded and written out.
    let stats = finish(pipeline, rx, &job.output)?;
    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

/// Cut `offset..end` out of every track and turn it into encoder input.
/// `None` when the piece converts to nothing, which happens for a short
/// final piece on a large downsampling ratio.
fn prepare_chunk(
    job: &TranscodeJob,
    normalizer: &ChunkNormalizer,
    tracks: &[PcmChunk],
    offset: usize,
    end: usize,
) -> Result<Option<Bytes>> {
    let pieces = tracks
        .iter()
        .map(|t| {
            PcmChunk::new(
                t.data().slice(offset..end),
                t.sample_rate(),
                t.bit_depth(),
                t.channels(),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let converted = match &job.mix {
        Some(strategy) => mix_chunks(normalizer, &pieces, strategy.clone()),
        None => normalizer.normalize(&pieces[0]),
    };
    let chunk = match converted {
        Ok(chunk) => chunk,
        Err(TranscodeError::EmptyResampleTarget {
            samples,
            input_rate,
            output_rate,
        }) => {
            warn!(
                samples,
                input_rate, output_rate, offset, "dropping input too short to resample"
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let data = match job.input.volume_db {
        Some(db) => Bytes::from(adjust_volume(chunk.data(), db)?),
        None => chunk.into_data(),
    };
    Ok((!data.is_empty()).then_some(data))
}

fn decode<F>(job: &TranscodeJob, factory: F) -> Result<StatsSnapshot>
where
    F: FnOnce(&CodecSession) -> Result<Box<dyn CodecDevice>>,
{
    let path = &job.input.paths[0];
    let stream = std::fs::read(path)?;
    let mut frames = AdtsFrames::new(&stream).peekable();

    // The decoder is configured once, from the first header.
    let mut codec = job.codec.clone();
    if let Some(Ok((header, _))) = frames.peek() {
        if let Some(rate) = header.sample_rate() {
            codec.sample_rate = rate;
        }
        if header.channel_config > 0 {
            codec.channels = header.channel_config as u16;
        }
        codec.profile = header.profile;
        if codec != job.codec {
            info!(
                sample_rate = codec.sample_rate,
                channels = codec.channels,
                profile = %codec.profile,
                "using stream layout from the ADTS header"
            );
        }
    }

    let (tx, rx) = unbounded_channel();
    let pipeline = CodecPipeline::new(CodecMode::Decode, codec, Arc::new(tx));
    pipeline.prepare_with(factory)?;
    pipeline.start()?;
    info!(
        input = %path.display(),
        bytes = stream.len(),
        output = %job.output.display(),
        "decoding"
    );

    for frame in frames {
        let payload = match frame {
            Ok((_, payload)) => payload,
            Err(e) => {
                warn!(error = %e, "stopping at malformed ADTS data");
                break;
            }
        };
        if let Err(e) = pipeline.submit(Bytes::copy_from_slice(payload)) {
            warn!(error = %e, "stopped submitting input");
            break;
        }
    }
    pipeline.request_stop();

    finish(pipeline, rx, &job.output)
}

/// Read every input file as PCM. Inputs of different length are cut to the
/// shortest so they can be mixed chunk by chunk.
fn load_tracks(input: &InputSpec) -> Result<Vec<PcmChunk>> {
    let frame = frame_size(input.channels, input.bit_depth);
    let mut raw = Vec::with_capacity(input.paths.len());
    for path in &input.paths {
        let mut data = std::fs::read(path)?;
        let whole = data.len() / frame * frame;
        if whole != data.len() {
            warn!(
                path = %path.display(),
                dropped = data.len() - whole,
                "input ends with a partial frame"
            );
            data.truncate(whole);
        }
        raw.push(data);
    }

    let shortest = raw.iter().map(Vec::len).min().unwrap_or(0);
    raw.into_iter()
        .zip(&input.paths)
        .map(|(mut data, path)| {
            if data.len() > shortest {
                warn!(
                    path = %path.display(),
                    dropped = data.len() - shortest,
                    "input longer than the others, truncating"
                );
                data.truncate(shortest);
            }
            PcmChunk::new(data, input.sample_rate, input.bit_depth, input.channels)
        })
        .collect()
}

/// Write every data event to `output` until the pipeline is released.
fn finish(
    pipeline: CodecPipeline,
    mut rx: UnboundedReceiver<PipelineEvent>,
    output: &Path,
) -> Result<StatsSnapshot> {
    let mut out = BufWriter::new(File::create(output)?);
    let mut failure = None;
    while let Some(event) = rx.blocking_recv() {
        match event {
            PipelineEvent::Data { data, .. } => out.write_all(&data)?,
            PipelineEvent::Error(msg) => failure = Some(msg),
            PipelineEvent::Released => break,
            PipelineEvent::Ready => {}
        }
    }
    out.flush()?;
    pipeline.wait_released(JOIN_TIMEOUT);

    if let Some(msg) = failure {
        return Err(match pipeline.mode() {
            CodecMode::Encode => CodecError::Encode(msg),
            CodecMode::Decode => CodecError::Decode(msg),
        }
        .into());
    }
    let stats = pipeline.stats();
    info!(
        frames = stats.frames_emitted,
        bytes_out = stats.bytes_out,
        output = %output.display(),
        "transcode finished"
    );
    Ok(stats)
}
