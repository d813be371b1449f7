use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::Threshold;

const STUB_LABELS: [&str; 4] = ["object", "person", "animal", "vehicle"];

/// Stub backend for tests and model-less demo runs.
///
/// With a scripted candidate set, `detect` filters it by the threshold and
/// returns the survivors in order. Without one, a single candidate is
/// derived from a hash of the pixel content, so identical frames always
/// yield identical results.
pub struct StubBackend {
    candidates: Option<Vec<Detection>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { candidates: None }
    }

    /// Fix the candidate set the backend filters from.
    pub fn with_candidates(candidates: Vec<Detection>) -> Self {
        Self {
            candidates: Some(candidates),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        threshold: Threshold,
    ) -> Result<Vec<Detection>> {
        let candidates = match &self.candidates {
            Some(scripted) => scripted.clone(),
            None => derive_candidates(pixels, width, height),
        };
        Ok(candidates
            .into_iter()
            .filter(|d| d.confidence >= threshold.value())
            .collect())
    }
}

/// Derive one deterministic candidate from the pixel content.
fn derive_candidates(pixels: &[u8], width: u32, height: u32) -> Vec<Detection> {
    let digest: [u8; 32] = Sha256::digest(pixels).into();

    let confidence = digest[0] as f32 / 255.0;
    let label = STUB_LABELS[digest[1] as usize % STUB_LABELS.len()];

    // Box placed from digest bytes, kept inside the frame.
    let w = width as f32;
    let h = height as f32;
    let bw = (w / 4.0).max(1.0);
    let bh = (h / 4.0).max(1.0);
    let x = (digest[2] as f32 / 255.0) * (w - bw).max(0.0);
    let y = (digest[3] as f32 / 255.0) * (h - bh).max(0.0);

    vec![Detection {
        label: label.to_string(),
        confidence,
        bbox: BoundingBox::new(x, y, bw, bh),
    }]
}
