//! Test fixtures for integration tests
//!
//! Codec devices that stand in for a real AAC encoder, a recording listener
//! and PCM generators. Nothing here needs FFmpeg.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::codec::{CodecDevice, InputBuffer, OutputBuffer, PipelineListener};
use crate::error::{CodecError, Result, TranscodeError};
use crate::pcm::chunk::write_i16_le;

/// Turns every input chunk into one "access unit" of `len / 16` bytes.
///
/// Holds at most `slots` finished units, so a slow drainer makes the feeder
/// retry the way a hardware codec does when its input buffers are busy.
pub struct FakeAacEncoder {
    slots: usize,
    pending: VecDeque<OutputBuffer>,
    started: bool,
    released: Arc<AtomicUsize>,
}

impl FakeAacEncoder {
    pub fn new() -> Self {
        Self::with_slots(2)
    }

    pub fn with_slots(slots: usize) -> Self {
        Self {
            slots,
            pending: VecDeque::new(),
            started: false,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter bumped by every `release` call
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.released.clone()
    }

    pub fn boxed(self) -> Box<dyn CodecDevice> {
        Box::new(self)
    }

    /// Payload produced for an input chunk of `len` bytes
    pub fn payload_len(len: usize) -> usize {
        (len / 16).max(1)
    }
}

impl Default for FakeAacEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecDevice for FakeAacEncoder {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn try_queue_input(&mut self, input: InputBuffer<'_>) -> Result<bool> {
        if !self.started {
            return Err(CodecError::Unavailable("fake encoder not started".into()).into());
        }
        if self.pending.len() >= self.slots {
            return Ok(false);
        }
        if input.end_of_stream {
            self.pending.push_back(OutputBuffer::end_of_stream(input.pts_us));
        } else {
            let n = Self::payload_len(input.data.len());
            let payload = input.data.iter().step_by(16).take(n).copied().collect::<Vec<_>>();
            self.pending.push_back(OutputBuffer::new(payload, input.pts_us));
        }
        Ok(true)
    }

    fn try_dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        Ok(self.pending.pop_front())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Device that accepts `ok_inputs` chunks and then fails.
pub struct FailingDevice {
    ok_inputs: usize,
    pending: VecDeque<OutputBuffer>,
    released: Arc<AtomicUsize>,
}

impl FailingDevice {
    pub fn after(ok_inputs: usize) -> Self {
        Self {
            ok_inputs,
            pending: VecDeque::new(),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.released.clone()
    }
}

impl CodecDevice for FailingDevice {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn try_queue_input(&mut self, input: InputBuffer<'_>) -> Result<bool> {
        if self.ok_inputs == 0 {
            return Err(CodecError::Encode("device lost".into()).into());
        }
        self.ok_inputs -= 1;
        self.pending
            .push_back(OutputBuffer::new(input.data.to_vec(), input.pts_us));
        Ok(true)
    }

    fn try_dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        Ok(self.pending.pop_front())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener that keeps everything it is told
#[derive(Default)]
pub struct Recorder {
    pub data: Mutex<Vec<(Bytes, i64)>>,
    pub errors: Mutex<Vec<String>>,
    pub ready: AtomicUsize,
    pub released: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.data.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.data.lock().iter().map(|(_, pts)| *pts).collect()
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl PipelineListener for Recorder {
    fn on_ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn on_data(&self, data: Bytes, pts_us: i64) {
        self.data.lock().push((data, pts_us));
    }

    fn on_error(&self, error: &TranscodeError) {
        self.errors.lock().push(error.to_string());
    }

    fn on_release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// `len` bytes of 16-bit silence
pub fn silence(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

/// Interleaved 16-bit frames where every channel `c` holds `values[c]`
pub fn constant_frames(values: &[i16], frames: usize) -> Vec<u8> {
    let samples = values
        .iter()
        .copied()
        .cycle()
        .take(values.len() * frames)
        .collect::<Vec<_>>();
    write_i16_le(&samples)
}

/// Mono 16-bit ramp `0, step, 2 * step, ...`
pub fn ramp(frames: usize, step: i16) -> Vec<u8> {
    let samples = (0..frames)
        .map(|i| (i as i16).wrapping_mul(step))
        .collect::<Vec<_>>();
    write_i16_le(&samples)
}
