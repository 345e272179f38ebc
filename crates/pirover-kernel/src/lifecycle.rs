//! [`PipelineLifecycle`] – the streaming pipeline's state machine.
//!
//! Every command bound for the [`Pipeline`] goes through this type, which
//! decides from the current [`PipelineState`] whether it may be forwarded.
//!
//! ```text
//! Uninitialized --init--> Initialized --surface_init--> SurfaceAttached
//! SurfaceAttached --ready: set_uri + play--> Playing <--pause/play--> Paused
//! any --finalize--> Finalized   (terminal)
//! ```
//!
//! # Forwarding policy
//!
//! - Stream and device commands (`set_uri`, `play`, `pause`, `surface_init`,
//!   `set_motor`, `set_accessory`) are forwarded only in `Initialized` through
//!   `Paused`.  In `Uninitialized` or `Finalized` they fail with
//!   [`RoverError::PipelineNotReady`]; nothing is buffered.
//! - `surface_finalize` is valid in `SurfaceAttached`, `Playing` and `Paused`.
//!   It drops the render target without touching the play/pause state, so a
//!   stream keeps running while the host recreates its surface.
//! - The ready notification is honoured at most once per lifecycle; later
//!   deliveries report [`ReadyOutcome::Duplicate`].

use std::sync::Arc;

use pirover_hal::{Pipeline, PipelineListener};
use pirover_types::{Accessory, PipelineState, RenderTarget, RoverError, Side};
use tracing::{debug, info, instrument};

/// What handling a ready notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// First notification: the stream locator was set and playback started.
    Started,
    /// A ready was already honoured; nothing was sent.
    Duplicate,
    /// The lifecycle is already finalized; the late notification was ignored.
    Stale,
}

/// State machine wrapping one [`Pipeline`] instance.
///
/// A finalized lifecycle cannot be revived; a new session needs a new
/// instance.
pub struct PipelineLifecycle {
    pipeline: Option<Box<dyn Pipeline>>,
    state: PipelineState,
    render_target: Option<RenderTarget>,
    ready_seen: bool,
}

impl PipelineLifecycle {
    pub fn new(pipeline: Box<dyn Pipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
            state: PipelineState::Uninitialized,
            render_target: None,
            ready_seen: false,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The render target the pipeline currently draws into, if any.
    pub fn render_target(&self) -> Option<RenderTarget> {
        self.render_target
    }

    /// `true` once a ready notification has been honoured.
    pub fn ready_seen(&self) -> bool {
        self.ready_seen
    }

    // Look up the pipeline if the current state accepts commands.
    fn live(&mut self, operation: &str) -> Result<&mut Box<dyn Pipeline>, RoverError> {
        let state = self.state;
        match self.pipeline.as_mut() {
            Some(pipeline) if state.accepts_commands() => Ok(pipeline),
            _ => Err(RoverError::not_ready(operation, state)),
        }
    }

    /// Start the pipeline.  Only valid from `Uninitialized`.
    ///
    /// # Errors
    ///
    /// - [`RoverError::InvalidTransition`] when called a second time.
    /// - Any error returned by the backend; the state stays `Uninitialized`.
    #[instrument(level = "debug", skip(self, listener))]
    pub fn init(&mut self, listener: Arc<dyn PipelineListener>) -> Result<(), RoverError> {
        if self.state != PipelineState::Uninitialized {
            return Err(RoverError::InvalidTransition {
                operation: "init".to_string(),
                state: self.state,
            });
        }
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| RoverError::not_ready("init", PipelineState::Uninitialized))?;
        pipeline.init(listener)?;
        self.state = PipelineState::Initialized;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_uri(&mut self, uri: &str) -> Result<(), RoverError> {
        self.live("set_uri")?.set_uri(uri)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn play(&mut self) -> Result<(), RoverError> {
        self.live("play")?.play()?;
        self.state = PipelineState::Playing;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn pause(&mut self) -> Result<(), RoverError> {
        self.live("pause")?.pause()?;
        self.state = PipelineState::Paused;
        Ok(())
    }

    /// Attach `target` as the render target.  Re-attaching with new
    /// dimensions replaces the previous attachment.
    #[instrument(level = "debug", skip(self))]
    pub fn surface_init(&mut self, target: RenderTarget) -> Result<(), RoverError> {
        self.live("surface_init")?.surface_init(target)?;
        self.render_target = Some(target);
        if self.state == PipelineState::Initialized {
            self.state = PipelineState::SurfaceAttached;
        }
        Ok(())
    }

    /// Detach the render target.  Returns once the pipeline no longer
    /// references it.
    ///
    /// # Errors
    ///
    /// - [`RoverError::PipelineNotReady`] in `Uninitialized` or `Finalized`.
    /// - [`RoverError::InvalidTransition`] in `Initialized` (nothing attached).
    #[instrument(level = "debug", skip(self))]
    pub fn surface_finalize(&mut self) -> Result<(), RoverError> {
        if !self.state.accepts_surface_finalize() {
            return Err(if self.state.accepts_commands() {
                RoverError::InvalidTransition {
                    operation: "surface_finalize".to_string(),
                    state: self.state,
                }
            } else {
                RoverError::not_ready("surface_finalize", self.state)
            });
        }
        self.live("surface_finalize")?.surface_finalize();
        self.render_target = None;
        if self.state == PipelineState::SurfaceAttached {
            self.state = PipelineState::Initialized;
        }
        Ok(())
    }

    pub fn set_motor(&mut self, side: Side, speed: i16) -> Result<(), RoverError> {
        self.live("set_motor")?.set_motor(side, speed)
    }

    pub fn set_accessory(&mut self, accessory: Accessory, on: bool) -> Result<(), RoverError> {
        self.live("set_accessory")?.set_accessory(accessory, on)
    }

    /// Handle the pipeline's ready notification: set `uri` and start playback
    /// the first time, ignore every later delivery.
    ///
    /// # Errors
    ///
    /// - [`RoverError::PipelineNotReady`] if delivered before `init`.
    /// - Backend errors from `set_uri` / `play`.
    #[instrument(level = "debug", skip(self))]
    pub fn on_ready(&mut self, uri: &str) -> Result<ReadyOutcome, RoverError> {
        match self.state {
            PipelineState::Finalized => {
                debug!("ready after finalize ignored");
                return Ok(ReadyOutcome::Stale);
            }
            PipelineState::Uninitialized => return Err(RoverError::not_ready("ready", self.state)),
            _ => {}
        }
        if self.ready_seen {
            debug!(state = ?self.state, "duplicate ready notification ignored");
            return Ok(ReadyOutcome::Duplicate);
        }
        self.ready_seen = true;
        self.set_uri(uri)?;
        self.play()?;
        info!(%uri, "pipeline ready, stream playing");
        Ok(ReadyOutcome::Started)
    }

    /// Move to `Finalized` and hand back the pipeline so the caller can
    /// finalize it outside any lock shared with the pipeline's own
    /// notification thread.  Returns `None` if already finalized.
    ///
    /// The caller must call [`Pipeline::finalize`] on the returned value.
    pub fn detach_for_finalize(&mut self) -> Option<Box<dyn Pipeline>> {
        if self.state == PipelineState::Finalized {
            return None;
        }
        debug!(from = ?self.state, "finalizing pipeline");
        self.state = PipelineState::Finalized;
        self.render_target = None;
        self.pipeline.take()
    }

    /// Finalize in place.  Idempotent.
    pub fn finalize(&mut self) {
        if let Some(mut pipeline) = self.detach_for_finalize() {
            pipeline.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pirover_hal::sim::{PipelineCall, SimPipeline, SimProbe};
    use pirover_types::SurfaceHandle;

    struct NullListener;

    impl PipelineListener for NullListener {
        fn on_ready(&self) {}
        fn on_size_changed(&self, _width: u32, _height: u32) {}
    }

    fn lifecycle() -> (PipelineLifecycle, SimProbe) {
        let pipeline = SimPipeline::new();
        let probe = pipeline.probe();
        (PipelineLifecycle::new(Box::new(pipeline)), probe)
    }

    fn started() -> (PipelineLifecycle, SimProbe) {
        let (mut lc, probe) = lifecycle();
        lc.init(Arc::new(NullListener)).unwrap();
        (lc, probe)
    }

    fn target(handle: u64, width: u32, height: u32) -> RenderTarget {
        RenderTarget {
            handle: SurfaceHandle(handle),
            width,
            height,
        }
    }

    #[test]
    fn init_moves_to_initialized() {
        let (lc, probe) = started();
        assert_eq!(lc.state(), PipelineState::Initialized);
        assert_eq!(probe.calls(), vec![PipelineCall::Init]);
    }

    #[test]
    fn second_init_is_invalid_transition() {
        let (mut lc, _) = started();
        let result = lc.init(Arc::new(NullListener));
        assert!(matches!(result, Err(RoverError::InvalidTransition { .. })));
    }

    #[test]
    fn failed_init_stays_uninitialized() {
        let mut lc = PipelineLifecycle::new(Box::new(SimPipeline::new().fail_init("boom")));
        assert!(lc.init(Arc::new(NullListener)).is_err());
        assert_eq!(lc.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn commands_rejected_before_init() {
        let (mut lc, probe) = lifecycle();
        assert!(lc.set_motor(Side::Left, 10).unwrap_err().is_not_ready());
        assert!(lc.set_accessory(Accessory::Hazards, true).unwrap_err().is_not_ready());
        assert!(lc.set_uri("rtsp://x").unwrap_err().is_not_ready());
        assert!(lc.play().unwrap_err().is_not_ready());
        assert!(lc.pause().unwrap_err().is_not_ready());
        assert!(lc.surface_init(target(1, 1, 1)).unwrap_err().is_not_ready());
        assert!(lc.surface_finalize().unwrap_err().is_not_ready());
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn commands_rejected_after_finalize() {
        let (mut lc, probe) = started();
        lc.finalize();
        assert_eq!(lc.state(), PipelineState::Finalized);

        let err = lc.set_motor(Side::Right, 50).unwrap_err();
        assert_eq!(err, RoverError::not_ready("set_motor", PipelineState::Finalized));
        assert!(lc.play().unwrap_err().is_not_ready());
        assert_eq!(probe.calls(), vec![PipelineCall::Init, PipelineCall::Finalize]);
    }

    #[test]
    fn finalize_is_terminal_and_idempotent() {
        let (mut lc, probe) = started();
        lc.finalize();
        lc.finalize();
        assert!(lc.detach_for_finalize().is_none());
        assert_eq!(probe.count(|c| *c == PipelineCall::Finalize), 1);
        assert!(matches!(
            lc.init(Arc::new(NullListener)),
            Err(RoverError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn finalize_from_uninitialized_still_releases_backend() {
        let (mut lc, probe) = lifecycle();
        lc.finalize();
        assert_eq!(lc.state(), PipelineState::Finalized);
        assert_eq!(probe.calls(), vec![PipelineCall::Finalize]);
    }

    #[test]
    fn surface_init_attaches_and_resizes() {
        let (mut lc, probe) = started();
        lc.surface_init(target(1, 640, 480)).unwrap();
        assert_eq!(lc.state(), PipelineState::SurfaceAttached);

        lc.surface_init(target(1, 480, 640)).unwrap();
        assert_eq!(lc.state(), PipelineState::SurfaceAttached);
        assert_eq!(lc.render_target(), Some(target(1, 480, 640)));
        assert_eq!(probe.max_live_targets(), 1);
    }

    #[test]
    fn ready_sets_uri_and_plays_exactly_once() {
        let (mut lc, probe) = started();
        lc.surface_init(target(1, 640, 480)).unwrap();

        assert_eq!(lc.on_ready("rtsp://rover/test").unwrap(), ReadyOutcome::Started);
        assert_eq!(lc.on_ready("rtsp://rover/test").unwrap(), ReadyOutcome::Duplicate);
        assert_eq!(lc.state(), PipelineState::Playing);

        assert_eq!(probe.count(|c| matches!(c, PipelineCall::SetUri(_))), 1);
        assert_eq!(probe.count(|c| *c == PipelineCall::Play), 1);
    }

    #[test]
    fn ready_before_init_is_rejected() {
        let (mut lc, _) = lifecycle();
        assert!(lc.on_ready("rtsp://x").unwrap_err().is_not_ready());
        assert!(!lc.ready_seen());
    }

    #[test]
    fn ready_after_finalize_is_stale() {
        let (mut lc, probe) = started();
        lc.finalize();
        assert_eq!(lc.on_ready("rtsp://x").unwrap(), ReadyOutcome::Stale);
        assert_eq!(probe.count(|c| *c == PipelineCall::Play), 0);
    }

    #[test]
    fn pause_and_play_toggle() {
        let (mut lc, _) = started();
        lc.surface_init(target(1, 640, 480)).unwrap();
        lc.on_ready("rtsp://x").unwrap();

        lc.pause().unwrap();
        assert_eq!(lc.state(), PipelineState::Paused);
        lc.play().unwrap();
        assert_eq!(lc.state(), PipelineState::Playing);
    }

    #[test]
    fn surface_finalize_keeps_playback_running() {
        let (mut lc, probe) = started();
        lc.surface_init(target(1, 640, 480)).unwrap();
        lc.on_ready("rtsp://x").unwrap();

        lc.surface_finalize().unwrap();
        assert_eq!(lc.state(), PipelineState::Playing);
        assert!(lc.render_target().is_none());
        assert!(probe.attached().is_none());

        lc.pause().unwrap();
        lc.surface_init(target(2, 640, 480)).unwrap();
        lc.surface_finalize().unwrap();
        assert_eq!(lc.state(), PipelineState::Paused);
    }

    #[test]
    fn surface_finalize_before_playback_returns_to_initialized() {
        let (mut lc, _) = started();
        lc.surface_init(target(1, 640, 480)).unwrap();
        lc.surface_finalize().unwrap();
        assert_eq!(lc.state(), PipelineState::Initialized);

        // Nothing attached any more.
        assert!(matches!(
            lc.surface_finalize(),
            Err(RoverError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn device_commands_forwarded_while_live() {
        let (mut lc, probe) = started();
        lc.set_motor(Side::Left, 75).unwrap();
        lc.set_accessory(Accessory::Headlights, true).unwrap();
        assert_eq!(
            probe.calls()[1..],
            [
                PipelineCall::SetMotor(Side::Left, 75),
                PipelineCall::SetAccessory(Accessory::Headlights, true),
            ]
        );
    }
}
