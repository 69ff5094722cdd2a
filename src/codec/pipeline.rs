//! Streaming AAC encode/decode pipeline
//!
//! One pipeline owns one codec session and two worker threads:
//!
//! ```text
//! submit() --> JobQueue --> feeder --> CodecDevice --> drainer --> listener
//! ```
//!
//! The feeder takes chunks in submission order and hands them to the device
//! with a running timestamp. Once the queue is closed by `request_stop` and
//! empty, it queues the end-of-stream marker. The drainer polls the device
//! for finished buffers, prefixes encoded frames with an ADTS header and
//! passes them to the listener until the device reports end of stream.
//! Whichever worker finishes second releases the device, exactly once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::codec::device::{CodecDevice, InputBuffer, OutputBuffer};
use crate::codec::queue::{JobQueue, Next};
use crate::codec::session::{CodecMode, CodecSession};
use crate::codec::default_device;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result, TranscodeError};
use crate::stats::{PipelineStats, StatsSnapshot};

/// Feeder and drainer
const WORKERS: usize = 2;

/// Receives pipeline output and lifecycle notifications.
///
/// Callbacks run on the worker threads (or on the caller's thread for
/// `on_ready` and prepare failures) and should return quickly.
pub trait PipelineListener: Send + Sync {
    /// The pipeline is prepared and waiting for `start`.
    fn on_ready(&self) {}

    /// One ADTS frame (encode) or PCM buffer (decode).
    fn on_data(&self, data: Bytes, pts_us: i64);

    /// A fatal error. Reported at most once per pipeline.
    fn on_error(&self, _error: &TranscodeError) {}

    /// The device has been released; no more callbacks follow. The pipeline
    /// reports `Released` only once this returns.
    fn on_release(&self) {}
}

impl<L: PipelineListener + ?Sized> PipelineListener for Arc<L> {
    fn on_ready(&self) {
        (**self).on_ready()
    }

    fn on_data(&self, data: Bytes, pts_us: i64) {
        (**self).on_data(data, pts_us)
    }

    fn on_error(&self, error: &TranscodeError) {
        (**self).on_error(error)
    }

    fn on_release(&self) {
        (**self).on_release()
    }
}

/// Listener callbacks as messages, for consumers on an async runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Ready,
    Data { data: Bytes, pts_us: i64 },
    Error(String),
    Released,
}

impl PipelineListener for UnboundedSender<PipelineEvent> {
    fn on_ready(&self) {
        let _ = self.send(PipelineEvent::Ready);
    }

    fn on_data(&self, data: Bytes, pts_us: i64) {
        let _ = self.send(PipelineEvent::Data { data, pts_us });
    }

    fn on_error(&self, error: &TranscodeError) {
        let _ = self.send(PipelineEvent::Error(error.to_string()));
    }

    fn on_release(&self) {
        let _ = self.send(PipelineEvent::Released);
    }
}

/// Lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Prepared,
    Running,
    Draining,
    Released,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Prepared => "prepared",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Released => "released",
        };
        f.write_str(name)
    }
}

struct Shared {
    mode: CodecMode,
    config: CodecConfig,
    listener: Arc<dyn PipelineListener>,
    state: Mutex<PipelineState>,
    state_changed: Condvar,
    session: Mutex<Option<Arc<CodecSession>>>,
    /// `None` once released
    device: Mutex<Option<Box<dyn CodecDevice>>>,
    /// Signalled whenever the device takes input or gives up output
    activity: Condvar,
    queue: JobQueue<Bytes>,
    stop_requested: AtomicBool,
    aborted: AtomicBool,
    finished: AtomicUsize,
    stats: PipelineStats,
}

impl Shared {
    fn invalid_state(&self, operation: &'static str, state: PipelineState) -> TranscodeError {
        TranscodeError::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    fn session(&self) -> Option<Arc<CodecSession>> {
        self.session.lock().clone()
    }

    /// Record a fatal error and make both workers stop. Only the first
    /// error reaches the listener.
    fn fail(&self, session: &CodecSession, err: TranscodeError) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            error!(session = %session.id(), error = %err, "codec pipeline failed");
            self.stats.record_error();
            self.queue.close();
            self.listener.on_error(&err);
        }
        self.activity.notify_all();
    }

    fn worker_done(&self, session: &CodecSession, role: &'static str) {
        let finished = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(session = %session.id(), role, finished, "worker finished");
        if finished == WORKERS {
            self.release(session);
        }
    }

    /// `Released` is published only after `on_release` returns, so
    /// `wait_released` and `state()` never run ahead of the callback.
    fn release(&self, session: &CodecSession) {
        if let Some(mut device) = self.device.lock().take() {
            device.release();
        }
        self.session.lock().take();

        let stats = self.stats.snapshot();
        info!(
            session = %session.id(),
            mode = %self.mode,
            chunks = stats.chunks_fed,
            frames = stats.frames_emitted,
            bytes_out = stats.bytes_out,
            "codec pipeline released"
        );
        self.listener.on_release();

        *self.state.lock() = PipelineState::Released;
        self.state_changed.notify_all();
    }
}

/// An AAC encoder or decoder session with its feeder and drainer workers.
///
/// All methods take `&self`; the pipeline can be shared between the threads
/// that submit data.
pub struct CodecPipeline {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CodecPipeline {
    /// PCM in, ADTS frames out.
    pub fn encoder(config: CodecConfig, listener: impl PipelineListener + 'static) -> Self {
        Self::new(CodecMode::Encode, config, Arc::new(listener))
    }

    /// Raw AAC access units in, PCM out.
    pub fn decoder(config: CodecConfig, listener: impl PipelineListener + 'static) -> Self {
        Self::new(CodecMode::Decode, config, Arc::new(listener))
    }

    pub fn new(mode: CodecMode, config: CodecConfig, listener: Arc<dyn PipelineListener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                mode,
                config,
                listener,
                state: Mutex::new(PipelineState::Idle),
                state_changed: Condvar::new(),
                session: Mutex::new(None),
                device: Mutex::new(None),
                activity: Condvar::new(),
                queue: JobQueue::new(),
                stop_requested: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                finished: AtomicUsize::new(0),
                stats: PipelineStats::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> CodecMode {
        self.shared.mode
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }

    /// Id of the live session, if one is prepared and not yet released
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.session().map(|s| s.id())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of chunks waiting for the feeder
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Configure a session on the default device for this mode.
    pub fn prepare(&self) -> Result<()> {
        self.prepare_with(default_device)
    }

    /// Configure a session on the device built by `factory`.
    ///
    /// A failure is reported to the listener once and returned; the pipeline
    /// stays `Idle`.
    pub fn prepare_with<F>(&self, factory: F) -> Result<()>
    where
        F: FnOnce(&CodecSession) -> Result<Box<dyn CodecDevice>>,
    {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if *state != PipelineState::Idle {
            return Err(shared.invalid_state("prepare", *state));
        }

        let prepared = shared.config.validate().and_then(|()| {
            let session = CodecSession::new(shared.mode, &shared.config);
            let device = factory(&session)?;
            Ok((session, device))
        });
        let session = match prepared {
            Ok((session, device)) => {
                let session = Arc::new(session);
                *shared.session.lock() = Some(session.clone());
                *shared.device.lock() = Some(device);
                *state = PipelineState::Prepared;
                session
            }
            Err(e) => {
                drop(state);
                error!(mode = %shared.mode, error = %e, "failed to prepare codec pipeline");
                shared.stats.record_error();
                shared.listener.on_error(&e);
                return Err(e);
            }
        };
        drop(state);
        shared.state_changed.notify_all();

        info!(
            session = %session.id(),
            mode = %shared.mode,
            sample_rate = session.sample_rate(),
            channels = session.channels(),
            profile = %session.profile(),
            "codec pipeline prepared"
        );

        if shared.config.auto_start {
            self.start()
        } else {
            shared.listener.on_ready();
            Ok(())
        }
    }

    /// Start the device and the workers. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        match *state {
            PipelineState::Prepared => {}
            PipelineState::Running | PipelineState::Draining => return Ok(()),
            other => return Err(shared.invalid_state("start", other)),
        }
        let session = shared
            .session()
            .ok_or_else(|| shared.invalid_state("start", *state))?;

        let started = match shared.device.lock().as_mut() {
            Some(device) => device.start(),
            None => Err(CodecError::Released.into()),
        };
        if let Err(e) = started {
            drop(state);
            error!(session = %session.id(), error = %e, "failed to start codec device");
            shared.stats.record_error();
            shared.aborted.store(true, Ordering::Release);
            shared.queue.close();
            shared.listener.on_error(&e);
            shared.release(&session);
            return Err(e);
        }

        *state = if shared.stop_requested.load(Ordering::Acquire) {
            PipelineState::Draining
        } else {
            PipelineState::Running
        };
        drop(state);
        shared.state_changed.notify_all();
        info!(session = %session.id(), mode = %shared.mode, "codec pipeline started");

        let mut workers = self.workers.lock();
        for (role, body) in [
            ("feeder", run_feeder as fn(&Shared, &CodecSession)),
            ("drainer", run_drainer as fn(&Shared, &CodecSession)),
        ] {
            let worker_shared = shared.clone();
            let worker_session = session.clone();
            let spawned = thread::Builder::new()
                .name(format!("aac-{}", role))
                .spawn(move || {
                    body(&worker_shared, &worker_session);
                    worker_shared.worker_done(&worker_session, role);
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.fail(&session, e.into());
                    shared.worker_done(&session, role);
                }
            }
        }
        Ok(())
    }

    /// Queue one chunk: 16-bit PCM when encoding, one raw AAC access unit
    /// (ADTS header stripped) when decoding.
    ///
    /// Accepted while `Prepared` or `Running`. After `request_stop` every
    /// submit is rejected with [`TranscodeError::StopRequested`].
    pub fn submit(&self, chunk: impl Into<Bytes>) -> Result<()> {
        let chunk = chunk.into();
        let shared = &self.shared;
        let state = shared.state.lock();
        if shared.stop_requested.load(Ordering::Acquire) {
            return Err(TranscodeError::StopRequested);
        }
        if shared.aborted.load(Ordering::Acquire) {
            return Err(TranscodeError::InvalidState {
                operation: "submit",
                state: "failed".into(),
            });
        }
        match *state {
            PipelineState::Prepared | PipelineState::Running => {}
            other => return Err(shared.invalid_state("submit", other)),
        }
        let len = chunk.len();
        let pending = shared
            .queue
            .push(chunk)
            .map_err(|_| TranscodeError::StopRequested)?;
        drop(state);
        shared.stats.record_submitted();
        debug!(bytes = len, pending, "chunk queued");
        Ok(())
    }

    /// Let the queue drain, then end the stream. Does not block.
    pub fn request_stop(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if shared.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.queue.close();
        if *state == PipelineState::Running {
            *state = PipelineState::Draining;
        }
        let current = *state;
        drop(state);
        shared.state_changed.notify_all();
        info!(state = %current, pending = shared.queue.len(), "stop requested");
    }

    /// Block until the pipeline is released or `timeout` passes. Returns
    /// whether it was released.
    pub fn wait_released(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        {
            let mut state = self.shared.state.lock();
            while *state != PipelineState::Released {
                if self
                    .shared
                    .state_changed
                    .wait_until(&mut state, deadline)
                    .timed_out()
                {
                    return *state == PipelineState::Released;
                }
            }
        }

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        true
    }
}

impl Drop for CodecPipeline {
    fn drop(&mut self) {
        self.request_stop();
        // A session that never started has no workers to release it.
        if self.state() == PipelineState::Prepared {
            if let Some(session) = self.shared.session() {
                self.shared.release(&session);
            }
        }
    }
}

fn run_feeder(shared: &Shared, session: &CodecSession) {
    let poll = shared.config.poll_interval();
    while !shared.aborted.load(Ordering::Acquire) {
        match shared.queue.next(poll) {
            Next::Job(chunk) => {
                let pts = session.advance(chunk.len());
                if !feed(shared, session, InputBuffer::data(&chunk, pts)) {
                    break;
                }
                shared.stats.record_fed(chunk.len());
                debug!(
                    session = %session.id(),
                    bytes = chunk.len(),
                    pts_us = pts,
                    pending = shared.queue.len(),
                    "fed chunk"
                );
            }
            Next::Idle => {}
            Next::Closed => {
                let pts = session.pts_us();
                if feed(shared, session, InputBuffer::end_of_stream(pts)) {
                    debug!(session = %session.id(), pts_us = pts, "queued end of stream");
                }
                break;
            }
        }
    }
}

/// Offer `input` until the device takes it. False if the pipeline failed
/// meanwhile.
fn feed(shared: &Shared, session: &CodecSession, input: InputBuffer<'_>) -> bool {
    let poll = shared.config.poll_interval();
    let mut device = shared.device.lock();
    loop {
        if shared.aborted.load(Ordering::Acquire) {
            return false;
        }
        let Some(dev) = device.as_mut() else {
            return false;
        };
        match dev.try_queue_input(input) {
            Ok(true) => {
                drop(device);
                shared.activity.notify_all();
                return true;
            }
            Ok(false) => {
                shared.activity.wait_for(&mut device, poll);
            }
            Err(e) => {
                drop(device);
                shared.fail(session, e);
                return false;
            }
        }
    }
}

fn run_drainer(shared: &Shared, session: &CodecSession) {
    let poll = shared.config.poll_interval();
    loop {
        let output = {
            let mut device = shared.device.lock();
            if shared.aborted.load(Ordering::Acquire) {
                break;
            }
            let Some(dev) = device.as_mut() else {
                break;
            };
            match dev.try_dequeue_output() {
                Ok(Some(output)) => output,
                Ok(None) => {
                    shared.activity.wait_for(&mut device, poll);
                    continue;
                }
                Err(e) => {
                    drop(device);
                    shared.fail(session, e);
                    break;
                }
            }
        };
        shared.activity.notify_all();

        let end_of_stream = output.end_of_stream;
        if !output.data.is_empty() {
            if let Err(e) = emit(shared, session, output) {
                shared.fail(session, e);
                break;
            }
        }
        if end_of_stream {
            debug!(session = %session.id(), "device reached end of stream");
            break;
        }
    }
}

fn emit(shared: &Shared, session: &CodecSession, output: OutputBuffer) -> Result<()> {
    let data = match session.mode() {
        CodecMode::Encode => Bytes::from(session.frame(&output.data)?),
        CodecMode::Decode => output.data,
    };
    shared.stats.record_emitted(data.len());
    debug!(
        session = %session.id(),
        bytes = data.len(),
        pts_us = output.pts_us,
        "emitting buffer"
    );
    shared.listener.on_data(data, output.pts_us);
    Ok(())
}
