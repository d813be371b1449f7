use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::capture::CameraConfig;
use crate::Threshold;

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_DEVICE_INDEX: u32 = 0;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 10;

/// Dashboard slider bounds for the confidence threshold.
const SLIDER_MIN: f32 = 0.1;
const SLIDER_MAX: f32 = 1.0;

#[derive(Debug, Deserialize, Default)]
struct SpotterdConfigFile {
    backend: Option<String>,
    threshold: Option<f32>,
    capture_mode: Option<String>,
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    labels: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device_index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

/// Whether webcam capture runs at all.
///
/// The hosted deployment disables capture entirely; uploads still work
/// because the pipeline does not depend on a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Local,
    Disabled,
}

impl CaptureMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(CaptureMode::Local),
            "disabled" => Ok(CaptureMode::Disabled),
            other => Err(anyhow!(
                "capture_mode must be 'local' or 'disabled', got '{}'",
                other
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub labels: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Clone, Debug)]
pub struct SpotterdConfig {
    pub backend: String,
    pub threshold: Threshold,
    pub capture_mode: CaptureMode,
    pub model: Option<ModelSettings>,
    pub camera: CameraConfig,
}

impl SpotterdConfig {
    /// Load configuration: JSON file named by `SPOTTER_CONFIG` (if set),
    /// then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SPOTTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: SpotterdConfigFile) -> Result<Self> {
        let backend = file.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let threshold = validate_threshold(file.threshold.unwrap_or(DEFAULT_THRESHOLD))?;
        let capture_mode = match file.capture_mode.as_deref() {
            Some(mode) => CaptureMode::parse(mode)?,
            None => CaptureMode::Local,
        };
        let model = file.model.and_then(|model| {
            model.path.map(|path| ModelSettings {
                path,
                labels: model.labels,
                input_width: model.input_width.unwrap_or(DEFAULT_WIDTH),
                input_height: model.input_height.unwrap_or(DEFAULT_HEIGHT),
            })
        });
        let camera = CameraConfig {
            device_index: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device_index)
                .unwrap_or(DEFAULT_DEVICE_INDEX),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
            target_fps: file
                .camera
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_FPS),
        };
        let cfg = Self {
            backend,
            threshold,
            capture_mode,
            model,
            camera,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("SPOTTER_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend;
            }
        }
        if let Ok(threshold) = std::env::var("SPOTTER_THRESHOLD") {
            let value: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("SPOTTER_THRESHOLD must be a number"))?;
            self.threshold = validate_threshold(value)?;
        }
        if let Ok(device) = std::env::var("SPOTTER_DEVICE") {
            self.camera.device_index = device
                .parse()
                .map_err(|_| anyhow!("SPOTTER_DEVICE must be a device index"))?;
        }
        if let Ok(mode) = std::env::var("SPOTTER_CAPTURE_MODE") {
            if !mode.trim().is_empty() {
                self.capture_mode = CaptureMode::parse(&mode)?;
            }
        }
        if let Ok(path) = std::env::var("SPOTTER_MODEL") {
            if !path.trim().is_empty() {
                let existing = self.model.take();
                self.model = Some(ModelSettings {
                    path: PathBuf::from(path),
                    labels: existing.as_ref().and_then(|m| m.labels.clone()),
                    input_width: existing
                        .as_ref()
                        .map(|m| m.input_width)
                        .unwrap_or(DEFAULT_WIDTH),
                    input_height: existing
                        .map(|m| m.input_height)
                        .unwrap_or(DEFAULT_HEIGHT),
                });
            }
        }
        if let Ok(path) = std::env::var("SPOTTER_LABELS") {
            if !path.trim().is_empty() {
                if let Some(model) = self.model.as_mut() {
                    model.labels = Some(PathBuf::from(path));
                }
            }
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.capture_mode == CaptureMode::Local && self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be non-zero in local mode"));
        }
        if self.backend == "tract" && self.model.is_none() {
            return Err(anyhow!("backend 'tract' requires a model path"));
        }
        Ok(())
    }
}

/// Threshold as the dashboard exposes it: the type enforces `(0.0, 1.0]`,
/// the config additionally holds the slider to its visible range.
fn validate_threshold(value: f32) -> Result<Threshold> {
    if !(SLIDER_MIN..=SLIDER_MAX).contains(&value) {
        return Err(anyhow!(
            "threshold must lie in [{}, {}], got {}",
            SLIDER_MIN,
            SLIDER_MAX,
            value
        ));
    }
    Ok(Threshold::new(value)?)
}

fn read_config_file(path: &Path) -> Result<SpotterdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
