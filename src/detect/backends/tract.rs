#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::Threshold;

/// Tract-based backend for ONNX object-detection models.
///
/// Loads a local model file and runs inference on RGB frames. Expects a
/// post-NMS export: one output tensor of shape `[1, n, 6]` where each row is
/// `(x1, y1, x2, y2, score, class_index)` in model-input coordinates. Class
/// indices are mapped through a names file, one label per line.
///
/// No network I/O; the model and names files are the only disk reads.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    /// Load an ONNX model and its class names from disk.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels_path: Option<P>,
        input_width: u32,
        input_height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = match labels_path {
            Some(path) => load_labels(path.as_ref())?,
            None => Vec::new(),
        };

        Ok(Self {
            model,
            labels,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        // Letterbox-free resize to the model's input size; boxes are scaled
        // back to frame coordinates in decode_output.
        let frame = image::RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        let resized = image::imageops::resize(
            &frame,
            self.input_width,
            self.input_height,
            image::imageops::FilterType::Triangle,
        );

        let input_width = self.input_width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, input_width),
            |(_, channel, y, x)| {
                let idx = (y * input_width + x) * 3 + channel;
                resized.as_raw()[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        threshold: Threshold,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("unexpected model output rank, wanted [1, n, 6]")?;

        if rows.shape()[2] < 6 {
            return Err(anyhow!(
                "unexpected model output shape {:?}, wanted [1, n, 6]",
                rows.shape()
            ));
        }

        let scale_x = frame_width as f32 / self.input_width as f32;
        let scale_y = frame_height as f32 / self.input_height as f32;

        let mut detections = Vec::new();
        for row in rows.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
            let score = row[4];
            if !score.is_finite() || score < threshold.value() {
                continue;
            }
            let x1 = row[0] * scale_x;
            let y1 = row[1] * scale_y;
            let x2 = row[2] * scale_x;
            let y2 = row[3] * scale_y;
            let class_index = row[5] as usize;
            let label = self
                .labels
                .get(class_index)
                .cloned()
                .unwrap_or_else(|| format!("class{}", class_index));
            detections.push(Detection {
                label,
                confidence: score.clamp(0.0, 1.0),
                bbox: BoundingBox::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0)),
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        threshold: Threshold,
    ) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, threshold, width, height)
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read class names from {}", path.display()))?;
    Ok(raw
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect())
}
