//! [`SurfaceAdapter`] – host display surface to pipeline render target.
//!
//! The host reports surface creation, size changes and destruction.  A
//! freshly created surface is only recorded: it becomes a render target when
//! its first size arrives, and every later size change re-attaches the same
//! handle with the new dimensions.
//!
//! Destruction detaches the render target from the pipeline *before*
//! [`SurfaceAdapter::on_destroyed`] returns, so the host never releases a
//! surface the pipeline is still drawing into.
//!
//! Only the handle the host most recently created is valid.  A size change
//! naming any other handle (never created, already destroyed, or replaced by
//! a newer surface) fails with [`RoverError::InvalidSurfaceHandle`] and never
//! reaches the pipeline.

use pirover_types::{RenderTarget, RoverError, SurfaceHandle};
use tracing::{debug, warn};

use crate::lifecycle::PipelineLifecycle;

/// Where the host surface currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    /// No surface exists.
    Absent,
    /// A surface exists but has no known size yet.
    Created(SurfaceHandle),
    /// The surface is the pipeline's render target.
    Attached(RenderTarget),
}

#[derive(Debug)]
pub struct SurfaceAdapter {
    phase: SurfacePhase,
    /// Created while another surface was still attached; the next size
    /// change for it swaps the attachment.
    replacement: Option<SurfaceHandle>,
}

impl Default for SurfaceAdapter {
    fn default() -> Self {
        Self {
            phase: SurfacePhase::Absent,
            replacement: None,
        }
    }
}

impl SurfaceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SurfacePhase {
        self.phase
    }

    /// The attached render target, if any.
    pub fn render_target(&self) -> Option<RenderTarget> {
        match self.phase {
            SurfacePhase::Attached(target) => Some(target),
            _ => None,
        }
    }

    /// Record a new surface.  Does not touch the pipeline.
    pub fn on_created(&mut self, handle: SurfaceHandle) {
        match self.phase {
            SurfacePhase::Attached(current) if current.handle != handle => {
                warn!(%handle, attached = %current.handle, "surface created while another is attached");
                self.replacement = Some(handle);
            }
            SurfacePhase::Attached(_) => self.replacement = None,
            _ => self.phase = SurfacePhase::Created(handle),
        }
        debug!(%handle, "surface created");
    }

    /// Whether a size change for `handle` may reach the pipeline.
    fn accepts(&self, handle: SurfaceHandle) -> bool {
        match self.phase {
            SurfacePhase::Absent => false,
            SurfacePhase::Created(current) => current == handle,
            SurfacePhase::Attached(target) => {
                target.handle == handle || self.replacement == Some(handle)
            }
        }
    }

    /// Attach `handle` at `width` x `height`.  Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// - [`RoverError::InvalidSurfaceHandle`] if `handle` is not the current
    ///   surface.
    /// - Whatever [`PipelineLifecycle::surface_init`] rejects; the phase is
    ///   left unchanged.
    pub fn on_changed(
        &mut self,
        handle: SurfaceHandle,
        width: u32,
        height: u32,
        lifecycle: &mut PipelineLifecycle,
    ) -> Result<(), RoverError> {
        if !self.accepts(handle) {
            debug!(%handle, phase = ?self.phase, "size change for unknown surface");
            return Err(RoverError::InvalidSurfaceHandle(handle));
        }
        let target = RenderTarget {
            handle,
            width,
            height,
        };
        lifecycle.surface_init(target)?;
        debug!(%handle, width, height, "surface attached");
        if self.replacement == Some(handle) {
            self.replacement = None;
        }
        self.phase = SurfacePhase::Attached(target);
        Ok(())
    }

    /// Detach the current surface.  When this returns `Ok` the pipeline no
    /// longer references it.  A surface created in the meantime becomes the
    /// current one.
    pub fn on_destroyed(&mut self, lifecycle: &mut PipelineLifecycle) -> Result<(), RoverError> {
        let handle = match self.phase {
            SurfacePhase::Absent => {
                debug!("surface destroyed with no surface recorded");
                return Ok(());
            }
            SurfacePhase::Created(handle) => handle,
            SurfacePhase::Attached(target) => {
                if lifecycle.state().accepts_surface_finalize() {
                    lifecycle.surface_finalize()?;
                } else {
                    // A finalized pipeline has already let go of everything.
                    debug!(state = ?lifecycle.state(), "skipping surface finalize");
                }
                target.handle
            }
        };
        self.phase = match self.replacement.take() {
            Some(next) => SurfacePhase::Created(next),
            None => SurfacePhase::Absent,
        };
        debug!(%handle, "surface destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pirover_hal::PipelineListener;
    use pirover_hal::sim::{PipelineCall, SimPipeline, SimProbe};
    use pirover_types::PipelineState;
    use std::sync::Arc;

    struct NullListener;

    impl PipelineListener for NullListener {
        fn on_ready(&self) {}
        fn on_size_changed(&self, _width: u32, _height: u32) {}
    }

    fn live_lifecycle() -> (PipelineLifecycle, SimProbe) {
        let pipeline = SimPipeline::new();
        let probe = pipeline.probe();
        let mut lc = PipelineLifecycle::new(Box::new(pipeline));
        lc.init(Arc::new(NullListener)).unwrap();
        (lc, probe)
    }

    const H1: SurfaceHandle = SurfaceHandle(1);
    const H2: SurfaceHandle = SurfaceHandle(2);

    #[test]
    fn created_surface_is_not_attached() {
        let (_, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        assert_eq!(adapter.phase(), SurfacePhase::Created(H1));
        assert!(adapter.render_target().is_none());
        assert_eq!(probe.calls(), vec![PipelineCall::Init]);
    }

    #[test]
    fn changed_attaches_with_size() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();

        let target = adapter.render_target().unwrap();
        assert_eq!((target.width, target.height), (640, 480));
        assert_eq!(probe.attached(), Some(target));
        assert_eq!(lc.state(), PipelineState::SurfaceAttached);
    }

    #[test]
    fn repeated_resizes_hold_one_target() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        for (w, h) in [(320, 240), (640, 480), (1280, 720), (1920, 1080)] {
            adapter.on_changed(H1, w, h, &mut lc).unwrap();
            assert_eq!(probe.attached().map(|t| t.width), Some(w));
        }
        assert_eq!(probe.max_live_targets(), 1);
        assert!(probe.released().is_empty());
    }

    #[test]
    fn destroyed_detaches_before_returning() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();

        adapter.on_destroyed(&mut lc).unwrap();
        assert!(probe.attached().is_none());
        assert_eq!(probe.released(), vec![H1]);
        assert_eq!(probe.calls().last(), Some(&PipelineCall::SurfaceFinalize));
        assert_eq!(adapter.phase(), SurfacePhase::Absent);
    }

    #[test]
    fn stale_handle_after_destroy_is_rejected() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        adapter.on_destroyed(&mut lc).unwrap();

        let err = adapter.on_changed(H1, 800, 600, &mut lc).unwrap_err();
        assert_eq!(err, RoverError::InvalidSurfaceHandle(H1));
        assert!(probe.attached().is_none());
    }

    #[test]
    fn recreated_handle_is_valid_again() {
        let (mut lc, _) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        adapter.on_destroyed(&mut lc).unwrap();

        adapter.on_created(H1);
        adapter.on_changed(H1, 480, 640, &mut lc).unwrap();
        assert_eq!(adapter.render_target().map(|t| t.height), Some(640));
    }

    #[test]
    fn new_surface_replaces_old_attachment() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        adapter.on_created(H2);
        adapter.on_changed(H2, 640, 480, &mut lc).unwrap();

        assert_eq!(probe.attached().map(|t| t.handle), Some(H2));
        assert_eq!(probe.max_live_targets(), 1);
    }

    #[test]
    fn destroy_without_attach_skips_pipeline() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_destroyed(&mut lc).unwrap();
        adapter.on_created(H1);
        adapter.on_destroyed(&mut lc).unwrap();
        assert_eq!(probe.count(|c| *c == PipelineCall::SurfaceFinalize), 0);
    }

    #[test]
    fn destroy_after_pipeline_finalized_is_ok() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        lc.finalize();

        adapter.on_destroyed(&mut lc).unwrap();
        assert_eq!(probe.count(|c| *c == PipelineCall::SurfaceFinalize), 0);
        assert!(probe.attached().is_none());
    }

    #[test]
    fn change_without_create_is_rejected() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        let err = adapter.on_changed(H1, 640, 480, &mut lc).unwrap_err();
        assert_eq!(err, RoverError::InvalidSurfaceHandle(H1));
        assert_eq!(adapter.phase(), SurfacePhase::Absent);
        assert_eq!(probe.calls(), vec![PipelineCall::Init]);
    }

    #[test]
    fn change_for_other_handle_is_rejected() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        let err = adapter.on_changed(H2, 640, 480, &mut lc).unwrap_err();
        assert_eq!(err, RoverError::InvalidSurfaceHandle(H2));
        assert_eq!(adapter.phase(), SurfacePhase::Created(H1));

        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        let err = adapter.on_changed(H2, 800, 600, &mut lc).unwrap_err();
        assert_eq!(err, RoverError::InvalidSurfaceHandle(H2));
        assert_eq!(probe.attached().map(|t| t.handle), Some(H1));
    }

    #[test]
    fn replaced_handle_is_rejected() {
        let (mut lc, _) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        adapter.on_destroyed(&mut lc).unwrap();
        adapter.on_created(H2);

        let err = adapter.on_changed(H1, 640, 480, &mut lc).unwrap_err();
        assert_eq!(err, RoverError::InvalidSurfaceHandle(H1));
        adapter.on_changed(H2, 480, 640, &mut lc).unwrap();
    }

    #[test]
    fn rotations_with_fresh_handles_keep_one_target() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        for n in 1..=500 {
            let handle = SurfaceHandle(n);
            adapter.on_created(handle);
            adapter.on_changed(handle, 640, 480, &mut lc).unwrap();
            adapter.on_destroyed(&mut lc).unwrap();
        }
        assert_eq!(adapter.phase(), SurfacePhase::Absent);
        assert_eq!(probe.max_live_targets(), 1);
    }

    #[test]
    fn destroying_old_surface_promotes_replacement() {
        let (mut lc, probe) = live_lifecycle();
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        adapter.on_changed(H1, 640, 480, &mut lc).unwrap();
        adapter.on_created(H2);

        adapter.on_destroyed(&mut lc).unwrap();
        assert_eq!(adapter.phase(), SurfacePhase::Created(H2));
        assert!(probe.attached().is_none());
        adapter.on_changed(H2, 480, 640, &mut lc).unwrap();
        assert_eq!(probe.attached().map(|t| t.handle), Some(H2));
    }

    #[test]
    fn change_before_init_is_not_ready() {
        let mut lc = PipelineLifecycle::new(Box::new(SimPipeline::new()));
        let mut adapter = SurfaceAdapter::new();
        adapter.on_created(H1);
        let err = adapter.on_changed(H1, 640, 480, &mut lc).unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(adapter.phase(), SurfacePhase::Created(H1));
    }
}
