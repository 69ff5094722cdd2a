//! Codec device abstraction
//!
//! A device is a hardware-style codec with a bounded set of input slots and
//! a queue of completed output buffers. Every method is non-blocking: the
//! pipeline workers poll with a bounded wait between attempts.

use bytes::Bytes;

use crate::error::Result;

/// One chunk handed to the device
#[derive(Debug, Clone, Copy)]
pub struct InputBuffer<'a> {
    pub data: &'a [u8],
    /// Presentation time in microseconds
    pub pts_us: i64,
    /// Marks the final buffer; `data` is empty
    pub end_of_stream: bool,
}

impl<'a> InputBuffer<'a> {
    pub fn data(data: &'a [u8], pts_us: i64) -> Self {
        Self {
            data,
            pts_us,
            end_of_stream: false,
        }
    }

    pub fn end_of_stream(pts_us: i64) -> Self {
        Self {
            data: &[],
            pts_us,
            end_of_stream: true,
        }
    }
}

/// One completed buffer taken from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    /// Raw AAC access unit when encoding, interleaved 16-bit PCM when decoding
    pub data: Bytes,
    pub pts_us: i64,
    /// Set on the last buffer the device will ever produce
    pub end_of_stream: bool,
}

impl OutputBuffer {
    pub fn new(data: impl Into<Bytes>, pts_us: i64) -> Self {
        Self {
            data: data.into(),
            pts_us,
            end_of_stream: false,
        }
    }

    pub fn end_of_stream(pts_us: i64) -> Self {
        Self {
            data: Bytes::new(),
            pts_us,
            end_of_stream: true,
        }
    }
}

/// An AAC encoder or decoder driven by [`crate::codec::CodecPipeline`]
pub trait CodecDevice: Send {
    /// Begin accepting input.
    fn start(&mut self) -> Result<()>;

    /// Offer one input buffer. `Ok(false)` means no slot is free right now
    /// and the same buffer should be offered again later.
    fn try_queue_input(&mut self, input: InputBuffer<'_>) -> Result<bool>;

    /// Take the next completed output buffer, if one is ready.
    fn try_dequeue_output(&mut self) -> Result<Option<OutputBuffer>>;

    /// Free the device. Called exactly once, after both workers finish.
    fn release(&mut self);
}

