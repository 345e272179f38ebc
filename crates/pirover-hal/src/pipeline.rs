//! Generic `Pipeline` trait for the streaming media backend that renders the
//! rover's video and carries its device commands.
//!
//! Backends implement this trait and are handed to the session's lifecycle
//! state machine.  The rest of the session only ever talks to the trait, so an
//! in-process decoder, an out-of-process player or a simulation can be swapped
//! without touching session logic.

use std::sync::Arc;

use pirover_types::{Accessory, RenderTarget, RoverError, Side};

/// Receiver of the asynchronous notifications a pipeline emits from its own
/// worker thread.
///
/// Implementations must return quickly and must not call back into the
/// pipeline from [`on_size_changed`][Self::on_size_changed].
pub trait PipelineListener: Send + Sync {
    /// The pipeline's loop is running and it can accept stream commands.
    /// May be delivered more than once.
    fn on_ready(&self);

    /// The media's native dimensions were detected or changed.
    fn on_size_changed(&self, width: u32, height: u32);
}

/// A streaming media pipeline with a device command side channel.
///
/// Every operation is a fast hand-off to the backend's own workers; none of
/// them may block waiting on a [`PipelineListener`] callback.
pub trait Pipeline: Send {
    /// Build the backend and start its worker.  `listener` receives the
    /// asynchronous notifications for the lifetime of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::PipelineFault`] when the backend cannot be built.
    fn init(&mut self, listener: Arc<dyn PipelineListener>) -> Result<(), RoverError>;

    /// Stop the worker and release every backend resource, including any
    /// attached render target.
    fn finalize(&mut self);

    /// Set the network locator of the stream.
    fn set_uri(&mut self, uri: &str) -> Result<(), RoverError>;

    fn play(&mut self) -> Result<(), RoverError>;

    fn pause(&mut self) -> Result<(), RoverError>;

    /// Render into `target`.  Replaces any previously attached target; calling
    /// it again with the same handle only updates the dimensions.
    fn surface_init(&mut self, target: RenderTarget) -> Result<(), RoverError>;

    /// Stop referencing the attached render target.  Must have released the
    /// target by the time it returns.
    fn surface_finalize(&mut self);

    /// Command the motors on `side` to `speed` (`-100..=100`).
    fn set_motor(&mut self, side: Side, speed: i16) -> Result<(), RoverError>;

    /// Switch `accessory` on or off.
    fn set_accessory(&mut self, accessory: Accessory, on: bool) -> Result<(), RoverError>;
}
