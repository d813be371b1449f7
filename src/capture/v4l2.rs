#![cfg(feature = "capture-v4l2")]

//! V4L2 camera device.
//!
//! Streams RGB frames from a local device node (e.g. /dev/video0). Open
//! failures surface as `DeviceUnavailable`, mid-stream capture failures as
//! `ReadFailure`; the session decides what to do with either.

use ouroboros::self_referencing;

use super::camera::{Camera, CameraConfig};
use crate::error::CaptureError;
use crate::frame::Frame;

pub struct V4l2Camera {
    config: CameraConfig,
    state: Option<V4l2State>,
    frames_read: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frames_read: 0,
        }
    }

    fn device_path(&self) -> String {
        format!("/dev/video{}", self.config.device_index)
    }
}

impl Camera for V4l2Camera {
    fn open(&mut self) -> Result<(), CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = self.device_path();
        let unavailable = |reason: String| CaptureError::DeviceUnavailable { reason };

        let mut device = v4l::Device::with_path(&path)
            .map_err(|err| unavailable(format!("open {}: {}", path, err)))?;
        let mut format = device
            .format()
            .map_err(|err| unavailable(format!("read format on {}: {}", path, err)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .map_err(|err| unavailable(format!("read format on {}: {}", path, err)))?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Camera: failed to set fps on {}: {}", path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| format!("create buffer stream: {}", err))
            },
        }
        .try_build()
        .map_err(unavailable)?;
        self.state = Some(state);

        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            path,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or(CaptureError::ReadFailure {
            reason: "device is not open".to_string(),
        })?;
        let mut pixels = state
            .with_stream_mut(|stream| stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| CaptureError::ReadFailure {
                reason: format!("capture frame: {}", err),
            })?;

        // Buffers may carry trailing padding beyond the packed RGB payload.
        let expected = (self.active_width as usize) * (self.active_height as usize) * 3;
        if pixels.len() < expected {
            return Err(CaptureError::ReadFailure {
                reason: format!("short frame: {} of {} bytes", pixels.len(), expected),
            });
        }
        pixels.truncate(expected);
        self.frames_read += 1;

        Frame::from_rgb8(pixels, self.active_width, self.active_height).map_err(|err| {
            CaptureError::ReadFailure {
                reason: format!("invalid frame from device: {}", err),
            }
        })
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            // Dropping the stream and device closes the node.
            log::info!(
                "V4l2Camera: released {} after {} frames",
                self.device_path(),
                self.frames_read
            );
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}
