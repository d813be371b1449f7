//! Error types for the spotter core.
//!
//! Every failure carries a distinct kind so the UI can react precisely:
//! a corrupt upload (`DecodeError`) is recoverable and changes no state, a
//! detector failure (`PipelineError::Model`) propagates unchanged, and a
//! capture session records whether the camera was never there
//! (`DeviceUnavailable`) or died mid-stream (`ReadFailure`).

use thiserror::Error;

use crate::capture::SessionState;

/// Input image could not be turned into a frame.
///
/// Recoverable: surfaced to the caller, no component state changes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("decoded image is empty")]
    EmptyFrame,

    #[error("buffer of {len} bytes does not match {width}x{height} RGB dimensions")]
    DimensionMismatch { len: usize, width: u32, height: u32 },
}

/// Frame pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The detector backend itself failed. Propagated unchanged; the
    /// pipeline never retries, that choice belongs to the caller.
    #[error("detector failed: {0}")]
    Model(anyhow::Error),
}

/// Confidence threshold outside `(0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("confidence threshold must lie in (0.0, 1.0], got {0}")]
pub struct InvalidThreshold(pub f32);

/// Programmatic kind recorded when a capture session enters `Failed`,
/// so callers can tell "no camera" apart from "camera died mid-stream".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    ReadFailure,
}

/// Capture-session failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device missing, busy, or permission-denied at open time.
    #[error("camera device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// Device stopped delivering frames mid-stream.
    #[error("frame read failed: {reason}")]
    ReadFailure { reason: String },

    /// Operation not accepted in the session's current state. The session
    /// state is unchanged; nothing is silently ignored.
    #[error("{op} is not valid from session state {from:?}")]
    InvalidTransition { from: SessionState, op: &'static str },

    /// Pipeline failure while streaming; forwarded through the result
    /// channel before the session shuts the stream down.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl CaptureError {
    /// The session-level kind, when this error drove a `Failed` transition.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CaptureError::DeviceUnavailable { .. } => Some(ErrorKind::DeviceUnavailable),
            CaptureError::ReadFailure { .. } => Some(ErrorKind::ReadFailure),
            _ => None,
        }
    }
}
