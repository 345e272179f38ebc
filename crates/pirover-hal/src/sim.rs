//! In-process simulated collaborators for tests and headless runs.
//!
//! [`SimPipeline`] stands in for the streaming backend.  It records every
//! call it receives, keeps track of the render target it is holding, and
//! applies motor/accessory commands to a [`ControlState`] so the
//! [`ControlLink`][crate::link::ControlLink] can transmit them.  A cloneable
//! [`SimProbe`] exposes that record after the pipeline itself has been moved
//! into a session.
//!
//! In threaded mode the pipeline runs a worker thread that emits the
//! asynchronous notifications the way a real media backend does: ready once
//! its loop runs and a window is attached, and the media size the first time
//! playback starts.
//!
//! # Example
//!
//! ```rust
//! use pirover_hal::sim::{PipelineCall, SimPipeline};
//! use pirover_hal::Pipeline;
//! use pirover_types::Side;
//!
//! let mut pipeline = SimPipeline::new();
//! let probe = pipeline.probe();
//!
//! pipeline.set_motor(Side::Left, 75).expect("sim motor must succeed");
//! assert_eq!(probe.calls(), vec![PipelineCall::SetMotor(Side::Left, 75)]);
//! ```

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pirover_types::{Accessory, RenderTarget, RoverError, Side, SurfaceHandle};
use tracing::{debug, warn};

use crate::control::ControlState;
use crate::layout::{LayoutSink, MediaSize};
use crate::pipeline::{Pipeline, PipelineListener};
use crate::wake_lock::WakeLock;

// ────────────────────────────────────────────────────────────────────────────
// Call record
// ────────────────────────────────────────────────────────────────────────────

/// One collaborator operation as observed by [`SimPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCall {
    Init,
    Finalize,
    SetUri(String),
    Play,
    Pause,
    SurfaceInit(RenderTarget),
    SurfaceFinalize,
    SetMotor(Side, i16),
    SetAccessory(Accessory, bool),
}

#[derive(Default)]
struct SimRecord {
    calls: Vec<PipelineCall>,
    attached: Option<RenderTarget>,
    live_targets: usize,
    max_live_targets: usize,
    released: Vec<SurfaceHandle>,
}

impl SimRecord {
    fn release_target(&mut self) {
        if let Some(target) = self.attached.take() {
            self.live_targets -= 1;
            self.released.push(target.handle);
        }
    }
}

/// Read-only view of a [`SimPipeline`]'s record.  Clone it before moving the
/// pipeline into a session.
#[derive(Clone)]
pub struct SimProbe {
    record: Arc<Mutex<SimRecord>>,
    control: Arc<ControlState>,
}

impl SimProbe {
    fn with<T>(&self, f: impl FnOnce(&SimRecord) -> T) -> T {
        f(&self.record.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<PipelineCall> {
        self.with(|r| r.calls.clone())
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&PipelineCall) -> bool) -> usize {
        self.with(|r| r.calls.iter().filter(|c| pred(c)).count())
    }

    /// The render target the pipeline currently references.
    pub fn attached(&self) -> Option<RenderTarget> {
        self.with(|r| r.attached)
    }

    /// Highest number of render targets referenced at the same time.
    pub fn max_live_targets(&self) -> usize {
        self.with(|r| r.max_live_targets)
    }

    /// Handles the pipeline has let go of, in release order.
    pub fn released(&self) -> Vec<SurfaceHandle> {
        self.with(|r| r.released.clone())
    }

    /// Register block the pipeline writes device commands into.
    pub fn control(&self) -> Arc<ControlState> {
        self.control.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker thread
// ────────────────────────────────────────────────────────────────────────────

enum WorkerSignal {
    WindowAttached,
    WindowReleased,
    Playing,
    Quit,
}

struct Worker {
    tx: mpsc::Sender<WorkerSignal>,
    handle: JoinHandle<()>,
}

fn worker_loop(
    rx: mpsc::Receiver<WorkerSignal>,
    listener: Arc<dyn PipelineListener>,
    media: MediaSize,
) {
    let mut window = false;
    let mut announced = false;
    let mut size_reported = false;

    loop {
        if window && !announced {
            debug!("sim pipeline ready, notifying listener");
            listener.on_ready();
            announced = true;
        }
        match rx.recv() {
            Ok(WorkerSignal::WindowAttached) => window = true,
            Ok(WorkerSignal::WindowReleased) => {
                // A new window re-arms the ready notification.
                window = false;
                announced = false;
            }
            Ok(WorkerSignal::Playing) => {
                if !size_reported {
                    listener.on_size_changed(media.width, media.height);
                    size_reported = true;
                }
            }
            Ok(WorkerSignal::Quit) | Err(_) => break,
        }
    }
    debug!("sim pipeline worker exited");
}

// ────────────────────────────────────────────────────────────────────────────
// SimPipeline
// ────────────────────────────────────────────────────────────────────────────

/// A simulated streaming pipeline.  Always succeeds unless
/// [`fail_init`][Self::fail_init] was configured.
pub struct SimPipeline {
    record: Arc<Mutex<SimRecord>>,
    control: Arc<ControlState>,
    media: Option<MediaSize>,
    init_failure: Option<String>,
    finalize_delay: Duration,
    worker: Option<Worker>,
}

impl Default for SimPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPipeline {
    /// A passive pipeline: notifications are never emitted on their own.
    pub fn new() -> Self {
        Self {
            record: Arc::default(),
            control: Arc::new(ControlState::new()),
            media: None,
            init_failure: None,
            finalize_delay: Duration::ZERO,
            worker: None,
        }
    }

    /// A pipeline with a worker thread that reports ready and a
    /// `media_width` x `media_height` media size on its own.
    pub fn threaded(media_width: u32, media_height: u32) -> Self {
        let mut pipeline = Self::new();
        pipeline.media = Some(MediaSize::new(media_width, media_height));
        pipeline
    }

    /// Write device commands into `control` instead of a private block.
    pub fn with_control(mut self, control: Arc<ControlState>) -> Self {
        self.control = control;
        self
    }

    /// Make [`Pipeline::init`] fail with `reason`.
    pub fn fail_init(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    /// Make [`Pipeline::finalize`] take `delay` before it records anything,
    /// like a decoder draining its buffers.
    pub fn slow_finalize(mut self, delay: Duration) -> Self {
        self.finalize_delay = delay;
        self
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe {
            record: self.record.clone(),
            control: self.control.clone(),
        }
    }

    fn record(&self, call: PipelineCall) {
        self.lock().calls.push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, signal: WorkerSignal) {
        if let Some(worker) = &self.worker {
            if worker.tx.send(signal).is_err() {
                warn!("sim pipeline worker is gone");
            }
        }
    }
}

impl Pipeline for SimPipeline {
    fn init(&mut self, listener: Arc<dyn PipelineListener>) -> Result<(), RoverError> {
        self.record(PipelineCall::Init);
        if let Some(reason) = &self.init_failure {
            return Err(RoverError::PipelineFault {
                operation: "init".to_string(),
                details: reason.clone(),
            });
        }
        if let Some(media) = self.media {
            let (tx, rx) = mpsc::channel();
            let handle = thread::Builder::new()
                .name("sim-pipeline".to_string())
                .spawn(move || worker_loop(rx, listener, media))
                .map_err(|e| RoverError::PipelineFault {
                    operation: "init".to_string(),
                    details: format!("failed to spawn worker: {e}"),
                })?;
            self.worker = Some(Worker { tx, handle });
        }
        Ok(())
    }

    fn finalize(&mut self) {
        if !self.finalize_delay.is_zero() {
            thread::sleep(self.finalize_delay);
        }
        {
            let mut rec = self.lock();
            rec.calls.push(PipelineCall::Finalize);
            rec.release_target();
        }
        self.control.stop_motors();
        if let Some(worker) = self.worker.take() {
            let _ = worker.tx.send(WorkerSignal::Quit);
            if worker.handle.join().is_err() {
                warn!("sim pipeline worker panicked");
            }
        }
    }

    fn set_uri(&mut self, uri: &str) -> Result<(), RoverError> {
        self.record(PipelineCall::SetUri(uri.to_string()));
        Ok(())
    }

    fn play(&mut self) -> Result<(), RoverError> {
        self.record(PipelineCall::Play);
        self.signal(WorkerSignal::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RoverError> {
        self.record(PipelineCall::Pause);
        Ok(())
    }

    fn surface_init(&mut self, target: RenderTarget) -> Result<(), RoverError> {
        let new_window = {
            let mut rec = self.lock();
            rec.calls.push(PipelineCall::SurfaceInit(target));
            match rec.attached {
                Some(current) if current.handle == target.handle => {
                    rec.attached = Some(target);
                    false
                }
                _ => {
                    rec.release_target();
                    rec.attached = Some(target);
                    rec.live_targets += 1;
                    rec.max_live_targets = rec.max_live_targets.max(rec.live_targets);
                    true
                }
            }
        };
        if new_window {
            self.signal(WorkerSignal::WindowReleased);
            self.signal(WorkerSignal::WindowAttached);
        }
        Ok(())
    }

    fn surface_finalize(&mut self) {
        {
            let mut rec = self.lock();
            rec.calls.push(PipelineCall::SurfaceFinalize);
            rec.release_target();
        }
        self.signal(WorkerSignal::WindowReleased);
    }

    fn set_motor(&mut self, side: Side, speed: i16) -> Result<(), RoverError> {
        self.record(PipelineCall::SetMotor(side, speed));
        self.control.set_side(side, speed);
        Ok(())
    }

    fn set_accessory(&mut self, accessory: Accessory, on: bool) -> Result<(), RoverError> {
        self.record(PipelineCall::SetAccessory(accessory, on));
        self.control.set_accessory(accessory, on);
        Ok(())
    }
}

impl Drop for SimPipeline {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.tx.send(WorkerSignal::Quit);
            // Dropped from inside a listener callback: the worker exits on its own.
            if worker.handle.thread().id() != thread::current().id() {
                let _ = worker.handle.join();
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub wake lock and layout
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WakeLockLog {
    held: bool,
    acquires: usize,
    releases: usize,
}

/// A simulated wake lock that counts acquire/release calls.  Clones share
/// the same counters.
#[derive(Debug, Clone, Default)]
pub struct SimWakeLock {
    log: Arc<Mutex<WakeLockLog>>,
}

impl SimWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquires(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).acquires
    }

    pub fn releases(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).releases
    }
}

impl WakeLock for SimWakeLock {
    fn acquire(&mut self) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.held = true;
        log.acquires += 1;
    }

    fn release(&mut self) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.held = false;
        log.releases += 1;
    }

    fn is_held(&self) -> bool {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).held
    }
}

/// A layout sink that records every relayout request.  Clones share the
/// same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingLayout {
    sizes: Arc<Mutex<Vec<MediaSize>>>,
}

impl RecordingLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sizes(&self) -> Vec<MediaSize> {
        self.sizes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LayoutSink for RecordingLayout {
    fn relayout(&mut self, width: u32, height: u32) {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MediaSize::new(width, height));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
