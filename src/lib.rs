//! spotter core: detection pipeline + webcam capture sessions.
//!
//! The dashboard UI hands this crate an uploaded image or a local camera
//! device and gets back annotated frames plus a deduplicated class summary.
//! Two components do all the real work:
//!
//! - `pipeline`: validate a decoded frame, run a detector backend at a
//!   confidence threshold, draw the overlay, summarize detected classes.
//! - `capture`: the start/stop lifecycle of a repeated-capture loop against
//!   a camera device, with explicit failure states instead of an ambient
//!   "is running" flag.
//!
//! Detector backends are pluggable (`detect`): a deterministic stub ships
//! for tests and model-less runs, and an ONNX backend is available behind
//! the `backend-tract` feature. Local V4L2 devices live behind the
//! `capture-v4l2` feature; everything else streams the synthetic camera.

pub mod annotate;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod pipeline;

#[cfg(feature = "capture-v4l2")]
pub use capture::V4l2Camera;
pub use capture::{Camera, CameraConfig, CaptureSession, SessionState, SessionStats, StubCamera};
pub use config::{CaptureMode, ModelSettings, SpotterdConfig};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend, StubBackend};
pub use error::{CaptureError, DecodeError, ErrorKind, InvalidThreshold, PipelineError};
pub use frame::Frame;
pub use pipeline::{DetectionOutcome, FramePipeline};

// -------------------- Confidence threshold --------------------

/// Minimum confidence a detection must meet to be reported.
///
/// Validated at construction: the value must lie in `(0.0, 1.0]`. Every
/// detector invocation within a session uses the session's current value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self, InvalidThreshold> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    /// The dashboard slider default.
    fn default() -> Self {
        Self(0.5)
    }
}

impl TryFrom<f32> for Threshold {
    type Error = InvalidThreshold;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
