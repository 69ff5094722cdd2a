//! AAC encoder device backed by FFmpeg
//!
//! Interleaved 16-bit PCM is split into FLTP planes and cut into frames of
//! the encoder's frame size. Finished packets are raw AAC access units; the
//! pipeline adds the ADTS header.

use std::collections::VecDeque;
use std::sync::Once;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;
use tracing::{debug, info, warn};

use crate::adts::AacProfile;
use crate::codec::device::{CodecDevice, InputBuffer, OutputBuffer};
use crate::codec::session::{CodecSession, SAMPLES_PER_ACCESS_UNIT};
use crate::config::RateControl;
use crate::error::{CodecError, Result};

/// Sample format the FFmpeg AAC encoder takes
pub const ENCODER_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);

/// Encoded packets held before the device stops taking input
const OUTPUT_SLOTS: usize = 16;

/// FFmpeg's `FF_QP2LAMBDA`
const QP2LAMBDA: usize = 118;

static INIT: Once = Once::new();

fn init_ffmpeg() {
    INIT.call_once(|| match ffmpeg::init() {
        Ok(()) => info!("FFmpeg initialized"),
        Err(e) => warn!("ffmpeg::init() failed: {}", e),
    });
}

/// Whether this FFmpeg build has an AAC encoder.
pub fn is_aac_encoder_available() -> bool {
    init_ffmpeg();
    codec::encoder::find(codec::Id::AAC).is_some()
}

pub struct FfmpegAacEncoder {
    encoder: Option<ffmpeg::encoder::Audio>,
    layout: ChannelLayout,
    channels: usize,
    sample_rate: u32,
    frame_size: usize,
    /// Samples waiting for a full frame, one Vec per channel
    planes: Vec<Vec<f32>>,
    samples_sent: i64,
    ready: VecDeque<OutputBuffer>,
    started: bool,
}

impl FfmpegAacEncoder {
    /// Open an AAC-LC encoder for the session's rate, channels and rate
    /// control. Only mono and stereo are supported.
    pub fn open(session: &CodecSession) -> Result<Self> {
        if session.profile() != AacProfile::Lc {
            return Err(CodecError::UnsupportedProfile(session.profile().to_string()).into());
        }
        let layout = match session.channels() {
            1 => ChannelLayout::MONO,
            2 => ChannelLayout::STEREO,
            other => return Err(CodecError::UnsupportedChannels(other).into()),
        };

        init_ffmpeg();
        let aac = codec::encoder::find(codec::Id::AAC).ok_or_else(|| {
            CodecError::Unavailable("AAC encoder not found in this FFmpeg build".into())
        })?;

        let sample_rate = session.sample_rate();
        let mut context = codec::Context::new_with_codec(aac);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio_enc = context
            .encoder()
            .audio()
            .map_err(|e| CodecError::Open(format!("cannot get audio encoder handle: {}", e)))?;
        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(ENCODER_SAMPLE_FMT);
        audio_enc.set_channel_layout(layout);
        match session.rate_control() {
            RateControl::BitRate(bps) => audio_enc.set_bit_rate(bps as usize),
            RateControl::Quality(q) => {
                audio_enc.set_flags(codec::Flags::QSCALE);
                audio_enc.set_quality(q as usize * QP2LAMBDA);
            }
        }

        let encoder = audio_enc
            .open_as(aac)
            .map_err(|e| CodecError::Open(format!("failed to open AAC encoder: {}", e)))?;
        let frame_size = match encoder.frame_size() as usize {
            0 => SAMPLES_PER_ACCESS_UNIT as usize,
            n => n,
        };

        debug!(
            session = %session.id(),
            sample_rate,
            channels = session.channels(),
            frame_size,
            "opened FFmpeg AAC encoder"
        );

        let channels = session.channels() as usize;
        Ok(Self {
            encoder: Some(encoder),
            layout,
            channels,
            sample_rate,
            frame_size,
            planes: vec![Vec::new(); channels],
            samples_sent: 0,
            ready: VecDeque::new(),
            started: false,
        })
    }

    fn encoder(&mut self) -> Result<&mut ffmpeg::encoder::Audio> {
        self.encoder.as_mut().ok_or_else(|| CodecError::Released.into())
    }

    /// De-interleave little-endian 16-bit PCM into the pending planes.
    fn buffer_pcm(&mut self, pcm: &[u8]) -> Result<()> {
        let frame = self.channels * 2;
        if pcm.len() % frame != 0 {
            return Err(CodecError::Encode(format!(
                "{} bytes is not a whole number of {}-channel frames",
                pcm.len(),
                self.channels
            ))
            .into());
        }
        for f in pcm.chunks_exact(frame) {
            for (ch, s) in f.chunks_exact(2).enumerate() {
                let sample = i16::from_le_bytes([s[0], s[1]]);
                self.planes[ch].push(sample as f32 / 32768.0);
            }
        }
        Ok(())
    }

    /// Encode `n` pending samples per channel as one frame.
    fn send_frame(&mut self, n: usize) -> Result<()> {
        let mut frame = ffmpeg::util::frame::Audio::new(ENCODER_SAMPLE_FMT, n, self.layout);
        frame.set_rate(self.sample_rate);
        frame.set_pts(Some(self.samples_sent));
        for ch in 0..self.channels {
            let plane = audio_plane_data_mut(&mut frame, ch);
            let floats = fltp_plane_as_f32_mut(plane, n).ok_or_else(|| {
                CodecError::Encode(format!("FLTP plane {} has bad alignment or length", ch))
            })?;
            floats.copy_from_slice(&self.planes[ch][..n]);
            self.planes[ch].drain(..n);
        }
        self.samples_sent += n as i64;

        self.encoder()?
            .send_frame(&frame)
            .map_err(|e| CodecError::Encode(format!("send_frame: {}", e)))?;
        self.receive_packets()
    }

    fn receive_packets(&mut self) -> Result<()> {
        let sample_rate = self.sample_rate as i64;
        loop {
            let mut packet = ffmpeg::codec::packet::Packet::empty();
            match self.encoder()?.receive_packet(&mut packet) {
                Ok(()) => {
                    let pts_us = packet.pts().unwrap_or(0) * 1_000_000 / sample_rate;
                    if let Some(data) = packet.data() {
                        self.ready.push_back(OutputBuffer::new(data.to_vec(), pts_us));
                    }
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    return Ok(())
                }
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) => {
                    return Err(CodecError::Encode(format!("receive_packet: {}", e)).into())
                }
            }
        }
    }

    /// Encode the partial last frame, flush the encoder and mark the end.
    fn finish(&mut self, pts_us: i64) -> Result<()> {
        let remaining = self.planes[0].len();
        if remaining > 0 {
            self.send_frame(remaining)?;
        }
        self.encoder()?
            .send_eof()
            .map_err(|e| CodecError::Encode(format!("send_eof: {}", e)))?;
        self.receive_packets()?;
        self.ready.push_back(OutputBuffer::end_of_stream(pts_us));
        Ok(())
    }
}

impl CodecDevice for FfmpegAacEncoder {
    fn start(&mut self) -> Result<()> {
        self.encoder()?;
        self.started = true;
        Ok(())
    }

    fn try_queue_input(&mut self, input: InputBuffer<'_>) -> Result<bool> {
        if !self.started {
            return Err(CodecError::Unavailable("encoder not started".into()).into());
        }
        if self.ready.len() >= OUTPUT_SLOTS {
            return Ok(false);
        }
        if input.end_of_stream {
            self.finish(input.pts_us)?;
            return Ok(true);
        }
        self.buffer_pcm(input.data)?;
        while self.planes[0].len() >= self.frame_size {
            self.send_frame(self.frame_size)?;
        }
        Ok(true)
    }

    fn try_dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        self.encoder()?;
        Ok(self.ready.pop_front())
    }

    fn release(&mut self) {
        if self.encoder.take().is_some() {
            debug!(samples = self.samples_sent, "released FFmpeg AAC encoder");
        }
        self.planes.iter_mut().for_each(Vec::clear);
        self.ready.clear();
    }
}

/// Mutable view of one plane of an audio frame.
///
/// `Audio::data_mut` stops at planes whose own linesize is 0, but FFmpeg
/// only fills `linesize[0]` for planar audio, so the plane pointers are read
/// directly.
fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;
        if index >= channels {
            return &mut [];
        }
        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }
        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }
        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

/// Reinterpret an FLTP plane as `sample_count` floats, if aligned and long
/// enough.
fn fltp_plane_as_f32_mut(bytes: &mut [u8], sample_count: usize) -> Option<&mut [f32]> {
    if bytes.len() < sample_count.checked_mul(4)? {
        return None;
    }
    let ptr = bytes.as_mut_ptr();
    if ptr as usize % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: length and alignment checked above; planes hold native-endian f32.
    Some(unsafe { std::slice::from_raw_parts_mut(ptr as *mut f32, sample_count) })
}
