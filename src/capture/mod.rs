//! Camera capture: devices and the session lifecycle.
//!
//! `Camera` is the device seam the session streams from. The stub camera
//! generates synthetic frames with scriptable failures; real V4L2 devices
//! live behind the `capture-v4l2` feature. `CaptureSession` owns exactly one
//! camera and is the only component allowed to open or release it.

mod camera;
mod session;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

pub use camera::{Camera, CameraConfig, StubCamera};
pub use session::{CaptureSession, SessionState, SessionStats};
#[cfg(feature = "capture-v4l2")]
pub use v4l2::V4l2Camera;
