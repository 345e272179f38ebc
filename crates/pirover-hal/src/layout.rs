//! Generic `LayoutSink` trait and supporting types for UI layout feedback.

/// Native dimensions of the incoming video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaSize {
    /// Width in pixels, already corrected for pixel aspect ratio.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl MediaSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The UI's layout context.
///
/// Only ever invoked on the UI side of the session; the pipeline thread hands
/// sizes over through a channel instead of calling this directly.
pub trait LayoutSink: Send {
    /// Recompute the video view's layout for media of `width` x `height`.
    fn relayout(&mut self, width: u32, height: u32);
}
