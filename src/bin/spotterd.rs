//! spotterd - webcam capture daemon.
//!
//! This daemon:
//! 1. Loads configuration (file + env overrides)
//! 2. Registers detector backends and picks the configured one
//! 3. Starts a capture session against the configured camera
//! 4. Logs one line per processed frame (count + deduplicated labels)
//! 5. Stops the session cleanly on Ctrl-C
//!
//! In `disabled` capture mode it exits immediately; uploads are served by
//! the one-shot `spot_image` tool instead.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spotter::{
    BackendRegistry, Camera, CaptureMode, CaptureSession, FramePipeline, SpotterdConfig,
    StubBackend,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SpotterdConfig::load()?;

    if cfg.capture_mode == CaptureMode::Disabled {
        log::warn!("webcam capture is disabled by configuration; nothing to stream");
        return Ok(());
    }

    let registry = build_registry(&cfg)?;
    let backend = registry
        .get(&cfg.backend)
        .ok_or_else(|| anyhow!("backend '{}' is not available in this build", cfg.backend))?;
    let pipeline = FramePipeline::new(backend);

    let camera = open_camera(&cfg);
    let frame_interval = Duration::from_millis(1000 / u64::from(cfg.camera.target_fps.max(1)));
    let mut session = CaptureSession::new(camera, pipeline, cfg.threshold)
        .with_frame_interval(frame_interval);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })?;

    let results = session.start()?;
    log::info!(
        "spotterd streaming device {} with backend '{}' at threshold {}",
        cfg.camera.device_index,
        cfg.backend,
        cfg.threshold
    );

    let mut frame_count = 0u64;
    let mut last_health_log = Instant::now();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("shutdown requested");
            break;
        }

        match results.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(outcome)) => {
                frame_count += 1;
                if outcome.detections.is_empty() {
                    log::debug!("frame #{}: no objects detected", frame_count);
                } else {
                    let labels: Vec<&str> =
                        outcome.unique_labels.iter().map(String::as_str).collect();
                    log::info!(
                        "frame #{}: {} object(s): {}",
                        frame_count,
                        outcome.detections.len(),
                        labels.join(", ")
                    );
                }
            }
            Ok(Err(err)) => {
                log::error!("capture stream failed: {}", err);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = session.stats();
            log::info!(
                "session health: state={:?} frames={}",
                stats.state,
                stats.frames_emitted
            );
            last_health_log = Instant::now();
        }
    }

    session.stop();
    let stats = session.stats();
    if let Some(kind) = stats.last_error {
        log::warn!("session ended with error: {:?}", kind);
    }
    log::info!("spotterd stopped after {} frames", stats.frames_emitted);
    Ok(())
}

fn build_registry(cfg: &SpotterdConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());

    #[cfg(feature = "backend-tract")]
    if let Some(model) = &cfg.model {
        let backend = spotter::TractBackend::new(
            model.path.clone(),
            model.labels.clone(),
            model.input_width,
            model.input_height,
        )?;
        registry.register(backend);
    }
    #[cfg(not(feature = "backend-tract"))]
    if cfg.model.is_some() {
        log::warn!("a model is configured but this build lacks the backend-tract feature");
    }

    Ok(registry)
}

fn open_camera(cfg: &SpotterdConfig) -> Box<dyn Camera> {
    #[cfg(feature = "capture-v4l2")]
    {
        Box::new(spotter::V4l2Camera::new(cfg.camera.clone()))
    }
    #[cfg(not(feature = "capture-v4l2"))]
    {
        log::info!("capture-v4l2 not enabled; streaming the synthetic camera");
        Box::new(spotter::StubCamera::new(cfg.camera.clone()))
    }
}
