//! Software AAC decoder device
//!
//! Wraps symphonia's AAC-LC decoder. Input is one raw access unit per
//! buffer (ADTS header already stripped); the stream layout comes out of
//! band through the session's AudioSpecificConfig. Output is interleaved
//! signed 16-bit little-endian PCM.

use std::collections::VecDeque;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_AAC};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, warn};

use crate::codec::device::{CodecDevice, InputBuffer, OutputBuffer};
use crate::codec::session::{CodecSession, SAMPLES_PER_ACCESS_UNIT};
use crate::error::{CodecError, Result};

/// Decoded buffers held before the device stops taking input
const OUTPUT_SLOTS: usize = 8;

pub struct SymphoniaAacDecoder {
    decoder: Option<Box<dyn Decoder>>,
    sample_buf: Option<SampleBuffer<i16>>,
    ready: VecDeque<OutputBuffer>,
    started: bool,
    packets: u64,
    skipped: u64,
}

impl SymphoniaAacDecoder {
    /// Open a decoder for the session's sample rate, profile and channels.
    pub fn open(session: &CodecSession) -> Result<Self> {
        let asc = session.audio_specific_config();
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(session.sample_rate())
            .with_extra_data(asc.to_vec().into_boxed_slice());

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| CodecError::Open(format!("AAC decoder: {}", e)))?;

        debug!(
            session = %session.id(),
            asc = ?asc,
            "opened symphonia AAC decoder"
        );

        Ok(Self {
            decoder: Some(decoder),
            sample_buf: None,
            ready: VecDeque::new(),
            started: false,
            packets: 0,
            skipped: 0,
        })
    }

    fn decode(&mut self, input: InputBuffer<'_>) -> Result<()> {
        let decoder = self.decoder.as_mut().ok_or(CodecError::Released)?;
        let packet = Packet::new_from_slice(
            0,
            self.packets * SAMPLES_PER_ACCESS_UNIT,
            SAMPLES_PER_ACCESS_UNIT,
            input.data,
        );
        self.packets += 1;

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                self.skipped += 1;
                warn!(
                    pts_us = input.pts_us,
                    bytes = input.data.len(),
                    "skipping corrupt AAC packet: {}",
                    msg
                );
                return Ok(());
            }
            Err(e) => return Err(CodecError::Decode(e.to_string()).into()),
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let needed = capacity as usize * spec.channels.count();
        if self
            .sample_buf
            .as_ref()
            .is_some_and(|buf| buf.capacity() < needed)
        {
            self.sample_buf = None;
        }
        let sample_buf = self
            .sample_buf
            .get_or_insert_with(|| SampleBuffer::<i16>::new(capacity, spec));
        sample_buf.copy_interleaved_ref(decoded);

        let mut pcm = Vec::with_capacity(sample_buf.len() * 2);
        for sample in sample_buf.samples() {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        self.ready.push_back(OutputBuffer::new(pcm, input.pts_us));
        Ok(())
    }
}

impl CodecDevice for SymphoniaAacDecoder {
    fn start(&mut self) -> Result<()> {
        if self.decoder.is_none() {
            return Err(CodecError::Released.into());
        }
        self.started = true;
        Ok(())
    }

    fn try_queue_input(&mut self, input: InputBuffer<'_>) -> Result<bool> {
        if !self.started {
            return Err(CodecError::Unavailable("decoder not started".into()).into());
        }
        if self.ready.len() >= OUTPUT_SLOTS {
            return Ok(false);
        }
        if input.end_of_stream {
            self.ready.push_back(OutputBuffer::end_of_stream(input.pts_us));
            return Ok(true);
        }
        self.decode(input)?;
        Ok(true)
    }

    fn try_dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        if self.decoder.is_none() {
            return Err(CodecError::Released.into());
        }
        Ok(self.ready.pop_front())
    }

    fn release(&mut self) {
        if self.decoder.take().is_some() {
            debug!(
                packets = self.packets,
                skipped = self.skipped,
                "released symphonia AAC decoder"
            );
        }
        self.sample_buf = None;
        self.ready.clear();
    }
}
