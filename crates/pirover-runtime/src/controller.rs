//! [`SessionController`] – composes one rover control session.
//!
//! The controller owns the [`Session`], the [`PipelineLifecycle`], the
//! [`SurfaceAdapter`], the [`AccessoryState`], both [`CommandChannel`]s and the
//! [`KeepAwake`] guard, all behind **one** mutex.  That mutex is the single
//! serialization point for everything that mutates the pipeline state:
//!
//! - UI-context calls (surface events, joystick samples, accessory toggles,
//!   play/pause, session start/end) lock it for the duration of the call.
//! - The pipeline's ready notification arrives on the pipeline's own thread
//!   and locks the same mutex before touching the lifecycle.
//! - The pipeline's size notification does **not** lock anything.  It is
//!   queued to the [`LayoutPump`] so the UI side can relayout without the
//!   pipeline thread ever waiting on session state.
//!
//! # Teardown
//!
//! [`SessionController::end`] marks the lifecycle `Finalized` under the lock,
//! then finalizes the detached pipeline *outside* the lock.  A pipeline worker
//! that is concurrently delivering a ready notification can therefore take
//! the lock, observe `Finalized`, and return, instead of deadlocking against a
//! finalize that is waiting for the worker to exit.  The wake lock is released
//! only after the pipeline finalize returned.  Concurrent callers of `end`
//! wait on a condition variable until that first teardown has finished, so
//! no caller returns while the pipeline is still being finalized.
//!
//! # Example
//!
//! ```rust
//! use pirover_hal::{SimPipeline, SimWakeLock};
//! use pirover_kernel::{ProcessRuntime, init_process};
//! use pirover_runtime::SessionController;
//! use pirover_types::{PipelineState, Side, SurfaceHandle};
//!
//! init_process(ProcessRuntime::new("sim")).expect("sim runtime is complete");
//!
//! let (session, _layout) = SessionController::new(
//!     "rtsp://172.24.1.1:8554/test",
//!     Box::new(SimPipeline::new()),
//!     Box::new(SimWakeLock::new()),
//! );
//! session.start().expect("session start");
//! session.surface_created(SurfaceHandle(1));
//! session.surface_changed(SurfaceHandle(1), 640, 480).expect("attach");
//! session.on_ready();
//! assert_eq!(session.state(), PipelineState::Playing);
//!
//! session.joystick_moved(Side::Left, 0, 75);
//! session.end();
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use pirover_hal::{MediaSize, Pipeline, PipelineListener, WakeLock};
use pirover_kernel::{
    AccessoryState, CommandChannel, KeepAwake, PipelineLifecycle, ReadyOutcome, SurfaceAdapter,
    process_runtime,
};
use pirover_types::{
    Accessory, MotorCommand, PipelineState, RenderTarget, RoverError, SessionInfo, Side,
    SideCommand, SurfaceHandle,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::input::InputEvent;
use crate::layout::{LayoutPump, LayoutSender};
use crate::session::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to one motor command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The pipeline accepted the command.
    Forwarded(SideCommand),
    /// The command was not forwarded.  Logged, never surfaced as an error.
    Dropped {
        command: SideCommand,
        reason: RoverError,
    },
}

impl CommandOutcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, CommandOutcome::Forwarded(_))
    }
}

/// Point-in-time view of a session for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub info: SessionInfo,
    pub state: PipelineState,
    pub render_target: Option<RenderTarget>,
    pub pending: MotorCommand,
    pub last_command: MotorCommand,
    pub accessories: Vec<(Accessory, bool)>,
    pub ready_seen: bool,
    pub keep_awake: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared core
// ─────────────────────────────────────────────────────────────────────────────

struct SessionCore {
    session: Session,
    lifecycle: PipelineLifecycle,
    surface: SurfaceAdapter,
    accessories: AccessoryState,
    left: CommandChannel,
    right: CommandChannel,
    keep_awake: KeepAwake,
    /// Set once the pipeline is finalized and the wake lock released.
    torn_down: bool,
}

impl SessionCore {
    fn channel(&self, side: Side) -> CommandChannel {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn apply(&mut self, cmd: SideCommand) -> CommandOutcome {
        self.session.request(cmd);
        match self.lifecycle.set_motor(cmd.side, cmd.speed) {
            Ok(()) => {
                self.session.commit(cmd);
                CommandOutcome::Forwarded(cmd)
            }
            Err(reason) => {
                if reason.is_not_ready() {
                    debug!(side = ?cmd.side, speed = cmd.speed, state = ?self.lifecycle.state(), "motor command dropped");
                } else {
                    warn!(side = ?cmd.side, speed = cmd.speed, error = %reason, "motor command dropped");
                }
                CommandOutcome::Dropped {
                    command: cmd,
                    reason,
                }
            }
        }
    }

    fn ready(&mut self) {
        let uri = self.session.stream_uri().to_string();
        match self.lifecycle.on_ready(&uri) {
            Ok(ReadyOutcome::Started) => {
                self.keep_awake.acquire();
            }
            Ok(ReadyOutcome::Duplicate) => debug!("duplicate ready notification"),
            Ok(ReadyOutcome::Stale) => debug!("ready after session end"),
            Err(e) => warn!(error = %e, "ready notification could not be honoured"),
        }
    }
}

fn lock(core: &Mutex<SessionCore>) -> MutexGuard<'_, SessionCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receives the pipeline's notifications.  Holds the core weakly so a
/// pipeline outliving its session cannot keep the session alive.
struct SessionListener {
    core: Weak<Mutex<SessionCore>>,
    layout: LayoutSender,
}

impl PipelineListener for SessionListener {
    fn on_ready(&self) {
        if let Some(core) = self.core.upgrade() {
            lock(&core).ready();
        }
    }

    fn on_size_changed(&self, width: u32, height: u32) {
        if self.layout.send(MediaSize::new(width, height)).is_err() {
            debug!(width, height, "layout receiver gone, size change dropped");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionController
// ─────────────────────────────────────────────────────────────────────────────

/// The single owner of a control session.  Cheap to share behind an `Arc`;
/// every method takes `&self`.
pub struct SessionController {
    core: Arc<Mutex<SessionCore>>,
    teardown: Condvar,
    layout: LayoutSender,
}

impl SessionController {
    /// Build a session for `stream_uri`.  Nothing reaches the pipeline until
    /// [`start`][Self::start].  The returned [`LayoutPump`] delivers media size
    /// changes to the UI side.
    pub fn new(
        stream_uri: impl Into<String>,
        pipeline: Box<dyn Pipeline>,
        wake_lock: Box<dyn WakeLock>,
    ) -> (Self, LayoutPump) {
        let session = Session::new(stream_uri);
        info!(session_id = %session.info().id, uri = %session.stream_uri(), "session created");
        let core = SessionCore {
            session,
            lifecycle: PipelineLifecycle::new(pipeline),
            surface: SurfaceAdapter::new(),
            accessories: AccessoryState::new(),
            left: CommandChannel::new(Side::Left),
            right: CommandChannel::new(Side::Right),
            keep_awake: KeepAwake::new(wake_lock),
            torn_down: false,
        };
        let (layout, pump) = LayoutPump::channel();
        (
            Self {
                core: Arc::new(Mutex::new(core)),
                teardown: Condvar::new(),
                layout,
            },
            pump,
        )
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        lock(&self.core)
    }

    // ── session start / end ─────────────────────────────────────────────────

    /// Initialise the pipeline.
    ///
    /// # Errors
    ///
    /// - [`RoverError::RuntimeNotInitialized`] if
    ///   [`init_process`][pirover_kernel::init_process] has not succeeded.
    /// - Whatever the pipeline's `init` reports.
    ///
    /// A session that could not be initialised is torn down before this
    /// returns; it cannot be started again.
    pub fn start(&self) -> Result<(), RoverError> {
        let result = self.try_start();
        if let Err(e) = &result {
            if self.state() == PipelineState::Uninitialized {
                error!(error = %e, "session start failed, tearing down");
                self.end();
            } else {
                warn!(error = %e, "session start rejected");
            }
        }
        result
    }

    fn try_start(&self) -> Result<(), RoverError> {
        let runtime = process_runtime().ok_or(RoverError::RuntimeNotInitialized)?;
        let listener = Arc::new(SessionListener {
            core: Arc::downgrade(&self.core),
            layout: self.layout.clone(),
        });
        self.lock().lifecycle.init(listener)?;
        info!(backend = %runtime.backend, "session started");
        Ok(())
    }

    /// Finalize the pipeline, then release the wake lock if held.
    /// Idempotent.  Returns only once teardown is complete, even when another
    /// caller started it.
    pub fn end(&self) {
        let detached = {
            let mut core = self.lock();
            if core.lifecycle.state() == PipelineState::Finalized {
                let _done = self
                    .teardown
                    .wait_while(core, |c| !c.torn_down)
                    .unwrap_or_else(PoisonError::into_inner);
                return;
            }
            core.lifecycle.detach_for_finalize()
        };
        // Outside the lock: the pipeline worker may be waiting on it.
        if let Some(mut pipeline) = detached {
            pipeline.finalize();
        }
        let mut core = self.lock();
        core.keep_awake.release();
        core.torn_down = true;
        self.teardown.notify_all();
        info!(session_id = %core.session.info().id, "session ended");
    }

    // ── pipeline notifications ──────────────────────────────────────────────

    /// Deliver the pipeline's ready notification.  Backends driven through
    /// [`PipelineListener`] reach this path on their own; hosts that relay
    /// notifications themselves call it directly.  Any number of deliveries
    /// start playback at most once.
    pub fn on_ready(&self) {
        self.lock().ready();
    }

    /// Queue a media size change for the layout side.  Never blocks.
    pub fn on_size_changed(&self, width: u32, height: u32) {
        if self.layout.send(MediaSize::new(width, height)).is_err() {
            debug!(width, height, "layout receiver gone, size change dropped");
        }
    }

    // ── surface ─────────────────────────────────────────────────────────────

    pub fn surface_created(&self, handle: SurfaceHandle) {
        self.lock().surface.on_created(handle);
    }

    /// # Errors
    ///
    /// [`RoverError::InvalidSurfaceHandle`] for a destroyed handle, or
    /// [`RoverError::PipelineNotReady`] outside the accepting states.
    pub fn surface_changed(
        &self,
        handle: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> Result<(), RoverError> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.surface
            .on_changed(handle, width, height, &mut core.lifecycle)
    }

    /// Detach the surface.  When this returns the pipeline no longer
    /// references it.
    pub fn surface_destroyed(&self) -> Result<(), RoverError> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.surface.on_destroyed(&mut core.lifecycle)
    }

    // ── playback ────────────────────────────────────────────────────────────

    pub fn play(&self) -> Result<(), RoverError> {
        self.lock().lifecycle.play()
    }

    pub fn pause(&self) -> Result<(), RoverError> {
        self.lock().lifecycle.pause()
    }

    // ── input ───────────────────────────────────────────────────────────────

    pub fn joystick_moved(&self, side: Side, pan: i32, tilt: i32) -> CommandOutcome {
        let mut core = self.lock();
        let cmd = core.channel(side).translate(pan, tilt);
        core.apply(cmd)
    }

    pub fn joystick_released(&self, side: Side) -> CommandOutcome {
        let mut core = self.lock();
        let cmd = core.channel(side).on_released();
        core.apply(cmd)
    }

    pub fn joystick_centered(&self, side: Side) -> CommandOutcome {
        let mut core = self.lock();
        let cmd = core.channel(side).on_returned_to_center();
        core.apply(cmd)
    }

    /// # Errors
    ///
    /// [`RoverError::PipelineNotReady`] outside the accepting states.
    pub fn set_accessory(&self, accessory: Accessory, on: bool) -> Result<(), RoverError> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.accessories.set(accessory, on, &mut core.lifecycle)
    }

    /// Route one [`InputEvent`].  Motor commands never fail here; a dropped
    /// command has already been logged.
    pub fn dispatch(&self, event: InputEvent) -> Result<(), RoverError> {
        match event {
            InputEvent::SessionStart => self.start(),
            InputEvent::SessionEnd => {
                self.end();
                Ok(())
            }
            InputEvent::SurfaceCreated { handle } => {
                self.surface_created(handle);
                Ok(())
            }
            InputEvent::SurfaceChanged {
                handle,
                width,
                height,
            } => self.surface_changed(handle, width, height),
            InputEvent::SurfaceDestroyed => self.surface_destroyed(),
            InputEvent::JoystickMoved { side, pan, tilt } => {
                self.joystick_moved(side, pan, tilt);
                Ok(())
            }
            InputEvent::JoystickReleased { side } => {
                self.joystick_released(side);
                Ok(())
            }
            InputEvent::JoystickCentered { side } => {
                self.joystick_centered(side);
                Ok(())
            }
            InputEvent::AccessoryToggled { accessory, on } => self.set_accessory(accessory, on),
        }
    }

    // ── inspection ──────────────────────────────────────────────────────────

    pub fn state(&self) -> PipelineState {
        self.lock().lifecycle.state()
    }

    pub fn last_command(&self) -> MotorCommand {
        self.lock().session.last_command()
    }

    pub fn status(&self) -> SessionStatus {
        let core = self.lock();
        SessionStatus {
            info: core.session.info().clone(),
            state: core.lifecycle.state(),
            render_target: core.surface.render_target(),
            pending: core.session.pending(),
            last_command: core.session.last_command(),
            accessories: core.accessories.snapshot(),
            ready_seen: core.lifecycle.ready_seen(),
            keep_awake: core.keep_awake.is_held(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.end();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pirover_hal::sim::{PipelineCall, SimProbe};
    use pirover_hal::{RecordingLayout, SimPipeline, SimWakeLock};
    use pirover_kernel::{ProcessRuntime, init_process};
    use std::time::{Duration, Instant};

    const URI: &str = "rtsp://172.24.1.1:8554/test";
    const H1: SurfaceHandle = SurfaceHandle(1);

    struct Harness {
        session: SessionController,
        layout: LayoutPump,
        probe: SimProbe,
        wake: SimWakeLock,
    }

    fn harness_with(pipeline: SimPipeline) -> Harness {
        init_process(ProcessRuntime::new("sim")).unwrap();
        let probe = pipeline.probe();
        let wake = SimWakeLock::new();
        let (session, layout) =
            SessionController::new(URI, Box::new(pipeline), Box::new(wake.clone()));
        Harness {
            session,
            layout,
            probe,
            wake,
        }
    }

    fn harness() -> Harness {
        harness_with(SimPipeline::new())
    }

    fn playing() -> Harness {
        let h = harness();
        h.session.start().unwrap();
        h.session.surface_created(H1);
        h.session.surface_changed(H1, 640, 480).unwrap();
        h.session.on_ready();
        h
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn start_to_playing_scenario() {
        let h = playing();
        assert_eq!(
            h.probe.calls(),
            vec![
                PipelineCall::Init,
                PipelineCall::SurfaceInit(RenderTarget {
                    handle: H1,
                    width: 640,
                    height: 480
                }),
                PipelineCall::SetUri(URI.to_string()),
                PipelineCall::Play,
            ]
        );
        assert_eq!(h.wake.acquires(), 1);
        assert_eq!(h.session.state(), PipelineState::Playing);
    }

    #[test]
    fn ready_zero_one_or_two_times() {
        for deliveries in 0..=2 {
            let h = harness();
            h.session.start().unwrap();
            h.session.surface_created(H1);
            h.session.surface_changed(H1, 640, 480).unwrap();
            for _ in 0..deliveries {
                h.session.on_ready();
            }
            let expected = usize::from(deliveries > 0);
            assert_eq!(h.probe.count(|c| matches!(c, PipelineCall::SetUri(_))), expected);
            assert_eq!(h.probe.count(|c| *c == PipelineCall::Play), expected);
            assert_eq!(h.wake.acquires(), expected);
        }
    }

    #[test]
    fn surface_destroyed_keeps_playing() {
        let h = playing();
        h.session.surface_destroyed().unwrap();

        assert_eq!(h.probe.calls().last(), Some(&PipelineCall::SurfaceFinalize));
        assert!(h.probe.attached().is_none());
        let status = h.session.status();
        assert_eq!(status.state, PipelineState::Playing);
        assert!(status.render_target.is_none());
    }

    #[test]
    fn joystick_move_then_release() {
        let h = playing();
        assert!(h.session.joystick_moved(Side::Left, 0, 75).is_forwarded());
        assert!(h.session.joystick_released(Side::Left).is_forwarded());

        let motors: Vec<_> = h
            .probe
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PipelineCall::SetMotor(..)))
            .collect();
        assert_eq!(
            motors,
            vec![
                PipelineCall::SetMotor(Side::Left, 75),
                PipelineCall::SetMotor(Side::Left, 0),
            ]
        );
        assert!(h.session.last_command().is_stopped());
    }

    #[test]
    fn headlights_twice_forwarded_twice() {
        let h = playing();
        h.session.set_accessory(Accessory::Headlights, true).unwrap();
        h.session.set_accessory(Accessory::Headlights, true).unwrap();
        assert_eq!(
            h.probe
                .count(|c| *c == PipelineCall::SetAccessory(Accessory::Headlights, true)),
            2
        );
    }

    #[test]
    fn commands_outside_live_states_drop_without_touching_last_command() {
        let h = harness();
        let outcome = h.session.joystick_moved(Side::Right, 0, 50);
        match outcome {
            CommandOutcome::Dropped { command, reason } => {
                assert_eq!(command, SideCommand::new(Side::Right, 50));
                assert!(reason.is_not_ready());
            }
            other => panic!("expected drop, got {other:?}"),
        }
        assert!(h.session.last_command().is_stopped());
        assert_eq!(h.session.status().pending.right, 50);
        assert!(
            h.session
                .set_accessory(Accessory::Hazards, true)
                .unwrap_err()
                .is_not_ready()
        );

        let h = playing();
        h.session.joystick_moved(Side::Left, 0, 40);
        h.session.end();
        assert!(!h.session.joystick_moved(Side::Left, 0, -90).is_forwarded());
        assert_eq!(h.session.last_command(), MotorCommand::new(40, 0));
        assert!(
            h.session
                .set_accessory(Accessory::Taillights, true)
                .unwrap_err()
                .is_not_ready()
        );
    }

    #[test]
    fn end_finalizes_then_releases_wake_lock() {
        let h = playing();
        h.session.end();
        assert_eq!(h.session.state(), PipelineState::Finalized);
        assert_eq!(h.probe.calls().last(), Some(&PipelineCall::Finalize));
        assert_eq!(h.wake.releases(), 1);

        h.session.end();
        assert_eq!(h.probe.count(|c| *c == PipelineCall::Finalize), 1);
        assert_eq!(h.wake.releases(), 1);
    }

    #[test]
    fn end_without_ready_does_not_release() {
        let h = harness();
        h.session.start().unwrap();
        h.session.end();
        assert_eq!(h.wake.acquires(), 0);
        assert_eq!(h.wake.releases(), 0);
    }

    #[test]
    fn finalize_precedes_wake_release() {
        use std::sync::Mutex as StdMutex;

        type Log = Arc<StdMutex<Vec<&'static str>>>;

        struct OrderedPipeline(Log);
        struct OrderedWakeLock(Log, bool);

        impl Pipeline for OrderedPipeline {
            fn init(&mut self, _l: Arc<dyn PipelineListener>) -> Result<(), RoverError> {
                Ok(())
            }
            fn finalize(&mut self) {
                self.0.lock().unwrap().push("finalize");
            }
            fn set_uri(&mut self, _uri: &str) -> Result<(), RoverError> {
                Ok(())
            }
            fn play(&mut self) -> Result<(), RoverError> {
                Ok(())
            }
            fn pause(&mut self) -> Result<(), RoverError> {
                Ok(())
            }
            fn surface_init(&mut self, _t: RenderTarget) -> Result<(), RoverError> {
                Ok(())
            }
            fn surface_finalize(&mut self) {}
            fn set_motor(&mut self, _s: Side, _v: i16) -> Result<(), RoverError> {
                Ok(())
            }
            fn set_accessory(&mut self, _a: Accessory, _on: bool) -> Result<(), RoverError> {
                Ok(())
            }
        }

        impl WakeLock for OrderedWakeLock {
            fn acquire(&mut self) {
                self.1 = true;
            }
            fn release(&mut self) {
                self.0.lock().unwrap().push("release");
                self.1 = false;
            }
            fn is_held(&self) -> bool {
                self.1
            }
        }

        init_process(ProcessRuntime::new("sim")).unwrap();
        let log: Log = Arc::default();
        let (session, _layout) = SessionController::new(
            URI,
            Box::new(OrderedPipeline(log.clone())),
            Box::new(OrderedWakeLock(log.clone(), false)),
        );
        session.start().unwrap();
        session.on_ready();
        session.end();
        assert_eq!(*log.lock().unwrap(), vec!["finalize", "release"]);
    }

    #[test]
    fn concurrent_end_waits_for_teardown() {
        let h = harness_with(SimPipeline::new().slow_finalize(Duration::from_millis(300)));
        h.session.start().unwrap();
        h.session.surface_created(H1);
        h.session.surface_changed(H1, 640, 480).unwrap();
        h.session.on_ready();
        assert!(h.wake.is_held());

        std::thread::scope(|s| {
            let first = s.spawn(|| h.session.end());
            // Let the first caller get into the slow finalize.
            assert!(wait_until(|| h.session.state() == PipelineState::Finalized));
            std::thread::sleep(Duration::from_millis(50));

            h.session.end();
            assert_eq!(h.probe.count(|c| *c == PipelineCall::Finalize), 1);
            assert!(!h.wake.is_held());
            assert_eq!(h.wake.releases(), 1);

            first.join().unwrap();
        });
        assert_eq!(h.wake.releases(), 1);
    }

    #[test]
    fn failed_init_tears_down() {
        let h = harness_with(SimPipeline::new().fail_init("no decoder"));
        let err = h.session.start().unwrap_err();
        assert!(matches!(err, RoverError::PipelineFault { .. }));
        assert_eq!(h.session.state(), PipelineState::Finalized);
        assert_eq!(h.probe.calls(), vec![PipelineCall::Init, PipelineCall::Finalize]);
        assert!(h.session.start().is_err());
    }

    #[test]
    fn second_start_is_rejected_but_session_survives() {
        let h = playing();
        let err = h.session.start().unwrap_err();
        assert!(matches!(err, RoverError::InvalidTransition { .. }));
        assert_eq!(h.session.state(), PipelineState::Playing);
    }

    #[test]
    fn size_changes_reach_the_layout_side() {
        let mut h = playing();
        h.session.on_size_changed(1280, 720);
        let mut layout = RecordingLayout::new();
        assert_eq!(h.layout.drain(&mut layout), 1);
        assert_eq!(layout.sizes(), vec![MediaSize::new(1280, 720)]);
    }

    #[test]
    fn dispatch_routes_every_event() {
        let h = harness();
        for event in [
            InputEvent::SessionStart,
            InputEvent::SurfaceCreated { handle: H1 },
            InputEvent::SurfaceChanged {
                handle: H1,
                width: 640,
                height: 480,
            },
        ] {
            h.session.dispatch(event).unwrap();
        }
        h.session.on_ready();
        for event in [
            InputEvent::JoystickMoved {
                side: Side::Right,
                pan: 10,
                tilt: 30,
            },
            InputEvent::JoystickCentered { side: Side::Right },
            InputEvent::JoystickReleased { side: Side::Left },
            InputEvent::AccessoryToggled {
                accessory: Accessory::Hazards,
                on: true,
            },
            InputEvent::SurfaceDestroyed,
            InputEvent::SessionEnd,
        ] {
            h.session.dispatch(event).unwrap();
        }

        let status = h.session.status();
        assert_eq!(status.state, PipelineState::Finalized);
        assert!(
            status
                .accessories
                .contains(&(Accessory::Hazards, true))
        );
        assert_eq!(
            h.probe.count(|c| matches!(c, PipelineCall::SetMotor(Side::Right, _))),
            2
        );
        assert_eq!(
            h.session.dispatch(InputEvent::SurfaceChanged {
                handle: H1,
                width: 1,
                height: 1
            }),
            Err(RoverError::InvalidSurfaceHandle(H1))
        );
    }

    #[test]
    fn threaded_pipeline_end_to_end() {
        let mut h = harness_with(SimPipeline::threaded(1920, 1080));
        h.session.start().unwrap();
        h.session.surface_created(H1);
        h.session.surface_changed(H1, 640, 480).unwrap();

        assert!(wait_until(|| h.session.state() == PipelineState::Playing));
        assert_eq!(h.wake.acquires(), 1);

        let mut layout = RecordingLayout::new();
        assert!(wait_until(|| h.layout.drain(&mut layout) > 0));
        assert_eq!(layout.sizes(), vec![MediaSize::new(1920, 1080)]);

        // Surface loss and recreation re-arms the backend's ready signal;
        // the session still starts playback only once.
        h.session.surface_destroyed().unwrap();
        h.session.surface_created(SurfaceHandle(2));
        h.session.surface_changed(SurfaceHandle(2), 480, 640).unwrap();
        h.session.joystick_moved(Side::Left, 0, 60);
        assert_eq!(h.probe.control().snapshot().side(Side::Left), 60);

        h.session.end();
        assert_eq!(h.probe.count(|c| *c == PipelineCall::Play), 1);
        assert_eq!(h.wake.acquires(), 1);
        assert_eq!(h.wake.releases(), 1);
        assert_eq!(h.probe.control().snapshot().side(Side::Left), 0);
    }

    #[test]
    fn ready_racing_end_does_not_deadlock() {
        for _ in 0..20 {
            let h = harness_with(SimPipeline::threaded(320, 240));
            h.session.start().unwrap();
            h.session.surface_created(H1);
            h.session.surface_changed(H1, 320, 240).unwrap();
            h.session.end();
            assert_eq!(h.session.state(), PipelineState::Finalized);
            assert!(h.wake.acquires() <= 1);
            assert_eq!(h.wake.acquires(), h.wake.releases());
        }
    }

    #[test]
    fn status_serializes() {
        let h = playing();
        let json = serde_json::to_value(h.session.status()).unwrap();
        assert_eq!(json["state"], "Playing");
        assert_eq!(json["render_target"]["width"], 640);
    }
}
