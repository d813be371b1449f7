use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CaptureError;
use crate::frame::Frame;

/// Configuration for a local camera device.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device index (e.g. 0 for /dev/video0).
    pub device_index: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            target_fps: 10,
        }
    }
}

/// A camera device the capture session can stream from.
///
/// The session is the single owner: it opens the device on `start`, reads
/// frames while streaming, and releases the handle on every exit path.
pub trait Camera: Send {
    /// Acquire the device. Fails with `DeviceUnavailable` when the device
    /// is missing, busy, or permission-denied.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Read one frame. Fails with `ReadFailure` when the device stops
    /// delivering mid-stream.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Release the device handle. Idempotent; safe to call after a failed
    /// open or read.
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

/// Synthetic camera for tests and machines without a capture device.
///
/// Generates a moving pixel pattern. Failures are scriptable: `unavailable`
/// makes `open` fail, `failing_after(n)` makes the n+1th read fail, which is
/// how the tests simulate a device disconnecting mid-stream.
pub struct StubCamera {
    config: CameraConfig,
    open: bool,
    frames_read: u64,
    fail_open: bool,
    fail_after: Option<u64>,
    released: Arc<AtomicBool>,
}

impl StubCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frames_read: 0,
            fail_open: false,
            fail_after: None,
            released: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A camera whose device does not exist; `open` always fails.
    pub fn unavailable(config: CameraConfig) -> Self {
        Self {
            fail_open: true,
            ..Self::new(config)
        }
    }

    /// A camera that delivers `frames` reads, then disconnects.
    pub fn failing_after(config: CameraConfig, frames: u64) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::new(config)
        }
    }

    /// Observer handle for leak tests: true whenever no device is held.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    fn synthetic_frame(&self) -> Frame {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frames_read) % 256) as u8;
        }
        Frame::from_rgb8(pixels, self.config.width, self.config.height)
            .expect("synthetic frame dimensions are valid")
    }
}

impl Camera for StubCamera {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.fail_open {
            return Err(CaptureError::DeviceUnavailable {
                reason: format!("no device at index {}", self.config.device_index),
            });
        }
        self.open = true;
        self.released.store(false, Ordering::SeqCst);
        log::info!(
            "StubCamera: opened device {} (synthetic)",
            self.config.device_index
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::ReadFailure {
                reason: "device is not open".to_string(),
            });
        }
        if let Some(limit) = self.fail_after {
            if self.frames_read >= limit {
                return Err(CaptureError::ReadFailure {
                    reason: format!("device disconnected after {} frames", limit),
                });
            }
        }
        let frame = self.synthetic_frame();
        self.frames_read += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.open = false;
        self.released.store(true, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn stub_camera_produces_frames() {
        let mut camera = StubCamera::new(CameraConfig::default());
        camera.open().unwrap();

        let frame = camera.read_frame().unwrap();
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
    }

    #[test]
    fn unavailable_camera_fails_open_with_device_kind() {
        let mut camera = StubCamera::unavailable(CameraConfig {
            device_index: 5,
            ..CameraConfig::default()
        });
        let err = camera.open().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DeviceUnavailable));
        assert!(!camera.is_open());
    }

    #[test]
    fn failing_camera_disconnects_after_n_reads() {
        let mut camera = StubCamera::failing_after(CameraConfig::default(), 3);
        camera.open().unwrap();

        for _ in 0..3 {
            camera.read_frame().unwrap();
        }
        let err = camera.read_frame().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReadFailure));
    }

    #[test]
    fn release_is_idempotent() {
        let mut camera = StubCamera::new(CameraConfig::default());
        let released = camera.release_flag();

        camera.open().unwrap();
        assert!(!released.load(Ordering::SeqCst));

        camera.release();
        camera.release();
        assert!(released.load(Ordering::SeqCst));
        assert!(!camera.is_open());
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut camera = StubCamera::new(CameraConfig::default());
        camera.open().unwrap();
        let first = camera.read_frame().unwrap();
        let second = camera.read_frame().unwrap();
        assert_ne!(first.data(), second.data());
    }
}
