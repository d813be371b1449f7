use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::Threshold;

/// Detector backend trait.
///
/// A backend locates and labels objects in a frame. Implementations must
/// treat the pixel slice as read-only and apply `threshold` themselves: no
/// detection below it may be reported. Raising the threshold must never
/// admit a detection the lower threshold rejected.
pub trait DetectorBackend: Send {
    /// Backend identifier used by the registry and config.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB8 frame at the given confidence threshold.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        threshold: Threshold,
    ) -> Result<Vec<Detection>>;

    /// Render boxes and label tags onto a copy of `frame`.
    ///
    /// The shared overlay renderer fits every backend we ship; override only
    /// for a model that carries its own plotting.
    fn annotate(&self, frame: &Frame, detections: &[Detection]) -> Frame {
        crate::annotate::render(frame, detections)
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
