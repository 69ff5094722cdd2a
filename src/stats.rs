//! Pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals for one pipeline, updated by the caller and both workers
#[derive(Debug, Default)]
pub struct PipelineStats {
    chunks_submitted: AtomicU64,
    chunks_fed: AtomicU64,
    bytes_in: AtomicU64,
    frames_emitted: AtomicU64,
    bytes_out: AtomicU64,
    errors: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.chunks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A chunk was accepted by the codec device
    pub fn record_fed(&self, bytes: usize) {
        self.chunks_fed.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A buffer was handed to the listener
    pub fn record_emitted(&self, bytes: usize) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_submitted: self.chunks_submitted.load(Ordering::Relaxed),
            chunks_fed: self.chunks_fed.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub chunks_submitted: u64,
    pub chunks_fed: u64,
    pub bytes_in: u64,
    pub frames_emitted: u64,
    pub bytes_out: u64,
    pub errors: u64,
}
