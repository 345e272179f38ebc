//! [`LayoutPump`] – carries media size changes from the pipeline thread to the
//! UI's layout context.
//!
//! The pipeline's size notification only enqueues; it never waits on the
//! session lock or the UI.  Whoever owns the UI side drains the pump, either
//! synchronously with [`LayoutPump::drain`] from its own loop or by spawning
//! [`LayoutPump::run`] on a tokio runtime.

use pirover_hal::{LayoutSink, MediaSize};
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half, held by the session and its pipeline listener.
pub(crate) type LayoutSender = mpsc::UnboundedSender<MediaSize>;

/// Receiving half of the size-change channel.
#[derive(Debug)]
pub struct LayoutPump {
    rx: mpsc::UnboundedReceiver<MediaSize>,
}

impl LayoutPump {
    pub(crate) fn channel() -> (LayoutSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Apply every queued size to `sink` without waiting.  Returns how many
    /// were applied.
    pub fn drain(&mut self, sink: &mut dyn LayoutSink) -> usize {
        let mut applied = 0;
        while let Ok(size) = self.rx.try_recv() {
            sink.relayout(size.width, size.height);
            applied += 1;
        }
        applied
    }

    /// Forward sizes to `sink` until the session is dropped.
    pub async fn run<S: LayoutSink>(mut self, mut sink: S) {
        while let Some(size) = self.rx.recv().await {
            debug!(width = size.width, height = size.height, "relayout");
            sink.relayout(size.width, size.height);
        }
        debug!("layout pump closed");
    }
}
