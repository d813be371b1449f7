//! Capture session lifecycle.
//!
//! A session owns one camera and streams it through a frame pipeline on a
//! dedicated worker thread. The lifecycle is an explicit state machine:
//!
//! ```text
//! Idle -> Opening -> Streaming -> Stopping -> Idle
//!            |           |
//!            +-----------+-----> Failed   (reset() -> Idle)
//! ```
//!
//! `Failed` is absorbing: the session must be `reset()` before another
//! `start()` is accepted, and it records which kind of failure happened so
//! the UI can tell "no camera" apart from "camera died mid-stream". The
//! worker checks the stop flag at every iteration boundary; cancellation
//! granularity is between frames, never mid-inference. The camera handle is
//! released on every exit path, including failed opens and mid-stream
//! failures.
//!
//! Transitions are serialized by `&mut self`; two `start` calls cannot
//! interleave.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::camera::Camera;
use crate::error::{CaptureError, ErrorKind};
use crate::pipeline::{DetectionOutcome, FramePipeline};
use crate::Threshold;

/// Default pacing between reads, matching the 10 fps capture default.
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Stopping,
    Failed,
}

/// Snapshot of a session for health logging.
#[derive(Clone, Copy, Debug)]
pub struct SessionStats {
    pub state: SessionState,
    pub last_error: Option<ErrorKind>,
    pub frames_emitted: u64,
}

/// State shared between the session handle and its worker thread.
struct Shared {
    state: SessionState,
    last_error: Option<ErrorKind>,
    threshold: Threshold,
    stop_request: bool,
    frames_emitted: u64,
}

/// One camera, one worker, one result stream.
///
/// `start()` returns the receiving end of the result channel: one
/// `Ok(DetectionOutcome)` per successful read, in read order. A terminal
/// failure is forwarded as the channel's final `Err` before the channel
/// closes. Dropping the receiver is treated as a stop request at the next
/// iteration boundary.
pub struct CaptureSession {
    shared: Arc<Mutex<Shared>>,
    pipeline: FramePipeline,
    frame_interval: Duration,
    // Held while Idle/Failed; moved into the worker while streaming.
    camera: Option<Box<dyn Camera>>,
    worker: Option<thread::JoinHandle<Box<dyn Camera>>>,
}

impl CaptureSession {
    pub fn new(camera: Box<dyn Camera>, pipeline: FramePipeline, threshold: Threshold) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Idle,
                last_error: None,
                threshold,
                stop_request: false,
                frames_emitted: 0,
            })),
            pipeline,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            camera: Some(camera),
            worker: None,
        }
    }

    /// Override the pacing between frame reads. Zero disables pacing.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().unwrap().state
    }

    /// Kind of the failure that put the session into `Failed`, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.shared.lock().unwrap().last_error
    }

    pub fn stats(&self) -> SessionStats {
        let shared = self.shared.lock().unwrap();
        SessionStats {
            state: shared.state,
            last_error: shared.last_error,
            frames_emitted: shared.frames_emitted,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.shared.lock().unwrap().threshold
    }

    /// Change the confidence threshold. Takes effect on the next frame read;
    /// already-emitted results are never reprocessed.
    pub fn set_threshold(&self, threshold: Threshold) {
        self.shared.lock().unwrap().threshold = threshold;
    }

    /// Acquire the configured device and start streaming.
    ///
    /// Valid only from `Idle`; anything else is rejected with
    /// `InvalidTransition` (a `Failed` session must be `reset()` first). On
    /// open failure the session enters `Failed` with
    /// `ErrorKind::DeviceUnavailable` and the error is returned.
    pub fn start(
        &mut self,
    ) -> Result<Receiver<Result<DetectionOutcome, CaptureError>>, CaptureError> {
        self.reap_finished_worker();

        {
            let mut shared = self.shared.lock().unwrap();
            match shared.state {
                SessionState::Idle => shared.state = SessionState::Opening,
                from => return Err(CaptureError::InvalidTransition { from, op: "start" }),
            }
        }

        let mut camera = match self.camera.take() {
            Some(camera) => camera,
            None => {
                // Worker panicked in an earlier run and took the camera with it.
                let mut shared = self.shared.lock().unwrap();
                shared.state = SessionState::Failed;
                shared.last_error = Some(ErrorKind::DeviceUnavailable);
                return Err(CaptureError::DeviceUnavailable {
                    reason: "camera handle was lost".to_string(),
                });
            }
        };

        if let Err(err) = camera.open() {
            // Release on the failure path too; a Failed session never holds
            // a device.
            camera.release();
            self.camera = Some(camera);
            let err = coerce_open_failure(err);
            let mut shared = self.shared.lock().unwrap();
            shared.state = SessionState::Failed;
            shared.last_error = err.kind();
            return Err(err);
        }

        {
            let mut shared = self.shared.lock().unwrap();
            shared.state = SessionState::Streaming;
            shared.stop_request = false;
            shared.frames_emitted = 0;
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let pipeline = self.pipeline.clone();
        let interval = self.frame_interval;
        self.worker = Some(thread::spawn(move || {
            worker_loop(camera, pipeline, shared, tx, interval)
        }));

        Ok(rx)
    }

    /// Stop streaming and return to `Idle`.
    ///
    /// The worker observes the stop flag at its next iteration boundary and
    /// releases the device before exiting. Calling `stop` on an `Idle` or
    /// `Failed` session is a no-op; in the `Failed` case the device was
    /// already released when the failure was recorded.
    pub fn stop(&mut self) {
        let stopping = {
            let mut shared = self.shared.lock().unwrap();
            match shared.state {
                SessionState::Streaming | SessionState::Opening => {
                    shared.state = SessionState::Stopping;
                    shared.stop_request = true;
                    true
                }
                _ => false,
            }
        };

        if stopping {
            self.join_worker();
            let mut shared = self.shared.lock().unwrap();
            if shared.state == SessionState::Stopping {
                // The worker may have hit a read failure between the stop
                // request and its next flag check; keep Failed in that case.
                shared.state = SessionState::Idle;
            }
            shared.stop_request = false;
        } else {
            self.reap_finished_worker();
        }
    }

    /// Return a `Failed` session to `Idle` so `start` is accepted again.
    pub fn reset(&mut self) -> Result<(), CaptureError> {
        self.reap_finished_worker();
        let mut shared = self.shared.lock().unwrap();
        match shared.state {
            SessionState::Failed => {
                shared.state = SessionState::Idle;
                shared.last_error = None;
                shared.stop_request = false;
                Ok(())
            }
            SessionState::Idle => Ok(()),
            from => Err(CaptureError::InvalidTransition { from, op: "reset" }),
        }
    }

    /// Join a worker that has already finished (Failed or self-stopped) and
    /// recover the camera handle. Never called while streaming.
    fn reap_finished_worker(&mut self) {
        let running = matches!(
            self.state(),
            SessionState::Streaming | SessionState::Stopping
        );
        if !running {
            self.join_worker();
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(camera) => self.camera = Some(camera),
                Err(_) => log::error!("capture worker panicked; camera handle lost"),
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    mut camera: Box<dyn Camera>,
    pipeline: FramePipeline,
    shared: Arc<Mutex<Shared>>,
    tx: Sender<Result<DetectionOutcome, CaptureError>>,
    interval: Duration,
) -> Box<dyn Camera> {
    loop {
        // Iteration boundary: observe stop requests and threshold changes.
        let threshold = {
            let shared = shared.lock().unwrap();
            if shared.stop_request {
                break;
            }
            shared.threshold
        };

        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                // No automatic retry: an unattended retry loop against a
                // dead device risks an unbounded spin. The caller decides by
                // issuing a fresh start.
                camera.release();
                let err = coerce_read_failure(err);
                {
                    let mut shared = shared.lock().unwrap();
                    shared.state = SessionState::Failed;
                    shared.last_error = err.kind();
                    shared.stop_request = false;
                }
                log::warn!("capture stream failed: {}", err);
                let _ = tx.send(Err(err));
                return camera;
            }
        };

        match pipeline.process_frame(&frame, threshold) {
            Ok(outcome) => {
                if tx.send(Ok(outcome)).is_err() {
                    // Receiver dropped: nobody is listening, treat it as a
                    // stop request.
                    camera.release();
                    let mut shared = shared.lock().unwrap();
                    shared.state = SessionState::Idle;
                    shared.stop_request = false;
                    return camera;
                }
                shared.lock().unwrap().frames_emitted += 1;
            }
            Err(err) => {
                // A broken detector would fail every subsequent frame;
                // surface it once and end the stream.
                camera.release();
                {
                    let mut shared = shared.lock().unwrap();
                    shared.state = SessionState::Failed;
                    shared.last_error = None;
                    shared.stop_request = false;
                }
                let _ = tx.send(Err(CaptureError::Pipeline(err)));
                return camera;
            }
        }

        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    // Cooperative stop path.
    camera.release();
    camera
}

/// Guarantee the `DeviceUnavailable` kind on the open path regardless of
/// what the camera implementation returned.
fn coerce_open_failure(err: CaptureError) -> CaptureError {
    match err {
        err @ CaptureError::DeviceUnavailable { .. } => err,
        other => CaptureError::DeviceUnavailable {
            reason: other.to_string(),
        },
    }
}

/// Guarantee the `ReadFailure` kind on the streaming path.
fn coerce_read_failure(err: CaptureError) -> CaptureError {
    match err {
        err @ CaptureError::ReadFailure { .. } => err,
        other => CaptureError::ReadFailure {
            reason: other.to_string(),
        },
    }
}
