//! End-to-end capture tests: stub camera through the real pipeline.

use std::sync::atomic::Ordering;
use std::time::Duration;

use spotter::{
    BackendRegistry, BoundingBox, CameraConfig, CaptureSession, Detection, ErrorKind,
    FramePipeline, SessionState, StubBackend, StubCamera, Threshold,
};

fn camera_config() -> CameraConfig {
    CameraConfig {
        device_index: 0,
        width: 32,
        height: 24,
        target_fps: 0,
    }
}

fn scripted_candidates() -> Vec<Detection> {
    vec![
        Detection {
            label: "cat".to_string(),
            confidence: 0.8,
            bbox: BoundingBox::new(2.0, 2.0, 8.0, 8.0),
        },
        Detection {
            label: "cat".to_string(),
            confidence: 0.7,
            bbox: BoundingBox::new(4.0, 4.0, 8.0, 8.0),
        },
        Detection {
            label: "dog".to_string(),
            confidence: 0.6,
            bbox: BoundingBox::new(10.0, 10.0, 8.0, 8.0),
        },
    ]
}

fn registry_pipeline() -> FramePipeline {
    // Wired the way spotterd does it: registry first, pipeline around the
    // configured backend.
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::with_candidates(scripted_candidates()));
    FramePipeline::new(registry.get("stub").expect("stub backend registered"))
}

#[test]
fn streams_frames_until_device_disconnects() {
    let camera = StubCamera::failing_after(camera_config(), 9);
    let released = camera.release_flag();
    let mut session = CaptureSession::new(
        Box::new(camera),
        registry_pipeline(),
        Threshold::new(0.5).unwrap(),
    )
    .with_frame_interval(Duration::ZERO);

    let results = session.start().expect("session starts");

    let mut outcomes = Vec::new();
    let mut terminal = None;
    for item in results.iter() {
        match item {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => terminal = Some(err),
        }
    }

    // Exactly nine results in read order, then the failure.
    assert_eq!(outcomes.len(), 9);
    for outcome in &outcomes {
        assert_eq!(outcome.detections.len(), 3);
        let labels: Vec<_> = outcome.unique_labels.iter().cloned().collect();
        assert_eq!(labels, vec!["cat", "dog"]);
    }
    assert_eq!(
        terminal.expect("terminal error").kind(),
        Some(ErrorKind::ReadFailure)
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert!(released.load(Ordering::SeqCst), "device must be released");
}

#[test]
fn full_stop_start_cycle_with_threshold_change() {
    let camera = StubCamera::new(camera_config());
    let released = camera.release_flag();
    let mut session = CaptureSession::new(
        Box::new(camera),
        registry_pipeline(),
        Threshold::new(0.5).unwrap(),
    )
    .with_frame_interval(Duration::ZERO);

    let results = session.start().expect("first start");
    let outcome = results.recv().unwrap().unwrap();
    assert_eq!(outcome.detections.len(), 3);

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(released.load(Ordering::SeqCst));

    // Restart with a stricter threshold: only the 0.8 cat survives.
    session.set_threshold(Threshold::new(0.75).unwrap());
    let results = session.start().expect("second start");
    let outcome = results.recv().unwrap().unwrap();
    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].label, "cat");
    let labels: Vec<_> = outcome.unique_labels.iter().cloned().collect();
    assert_eq!(labels, vec!["cat"]);

    session.stop();
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn failed_open_then_reset_then_successful_recovery_path() {
    // A session against a missing device fails; after reset the same
    // handle is reusable once the device "comes back".
    let camera = StubCamera::unavailable(camera_config());
    let released = camera.release_flag();
    let mut session = CaptureSession::new(
        Box::new(camera),
        registry_pipeline(),
        Threshold::new(0.5).unwrap(),
    )
    .with_frame_interval(Duration::ZERO);

    let err = session.start().expect_err("device is missing");
    assert_eq!(err.kind(), Some(ErrorKind::DeviceUnavailable));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(released.load(Ordering::SeqCst));

    session.reset().expect("reset from failed");
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_error(), None);
}
