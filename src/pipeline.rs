//! Frame pipeline: validate, detect, annotate, summarize.
//!
//! `FramePipeline` is the single path every image takes, whether it arrived
//! as an upload or a camera read. It is stateless: the result is a pure
//! function of the frame, the threshold, and the backend, and an empty
//! detection set is a valid "nothing found" result, not an error.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::detect::{Detection, DetectorBackend};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::Threshold;

/// Everything the UI needs to render one processed frame.
#[derive(Clone, Debug)]
pub struct DetectionOutcome {
    /// Copy of the input with boxes and label tags drawn.
    pub annotated: Frame,
    /// All detections at or above the threshold, in backend order.
    pub detections: Vec<Detection>,
    /// Deduplicated class labels across `detections`.
    pub unique_labels: BTreeSet<String>,
}

/// Stateless detect-and-annotate pipeline around one backend.
///
/// Cloning is cheap; clones share the backend, so a capture session's worker
/// thread can carry one while the daemon keeps another.
#[derive(Clone)]
pub struct FramePipeline {
    backend: Arc<Mutex<dyn DetectorBackend>>,
}

impl FramePipeline {
    pub fn new(backend: Arc<Mutex<dyn DetectorBackend>>) -> Self {
        Self { backend }
    }

    /// Convenience constructor around an owned backend.
    pub fn with_backend<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self::new(Arc::new(Mutex::new(backend)))
    }

    /// Run detection on `frame` and build the annotated summary.
    ///
    /// Backend failures propagate unchanged as `PipelineError::Model`; the
    /// pipeline never retries and never mutates `frame`.
    pub fn process_frame(
        &self,
        frame: &Frame,
        threshold: Threshold,
    ) -> Result<DetectionOutcome, PipelineError> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| PipelineError::Model(anyhow!("detector backend lock poisoned")))?;

        let detections = backend
            .detect(frame.data(), frame.width(), frame.height(), threshold)
            .map_err(PipelineError::Model)?;

        let annotated = backend.annotate(frame, &detections);
        let unique_labels = detections.iter().map(|d| d.label.clone()).collect();

        Ok(DetectionOutcome {
            annotated,
            detections,
            unique_labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, StubBackend};
    use anyhow::Result;

    fn frame() -> Frame {
        Frame::from_rgb8(vec![100u8; 64 * 48 * 3], 64, 48).unwrap()
    }

    fn candidate(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox: BoundingBox::new(4.0, 4.0, 20.0, 20.0),
        }
    }

    fn overlapping_cat_cat_dog() -> Vec<Detection> {
        vec![
            candidate("cat", 0.8),
            candidate("cat", 0.7),
            candidate("dog", 0.6),
        ]
    }

    #[test]
    fn duplicate_labels_collapse_in_summary() {
        let pipeline =
            FramePipeline::with_backend(StubBackend::with_candidates(overlapping_cat_cat_dog()));
        let outcome = pipeline
            .process_frame(&frame(), Threshold::new(0.5).unwrap())
            .unwrap();

        assert_eq!(outcome.detections.len(), 3);
        let labels: Vec<_> = outcome.unique_labels.iter().cloned().collect();
        assert_eq!(labels, vec!["cat", "dog"]);
    }

    #[test]
    fn unique_labels_never_exceed_detection_count() {
        let pipeline =
            FramePipeline::with_backend(StubBackend::with_candidates(overlapping_cat_cat_dog()));
        let outcome = pipeline
            .process_frame(&frame(), Threshold::new(0.5).unwrap())
            .unwrap();
        assert!(outcome.unique_labels.len() <= outcome.detections.len());
    }

    #[test]
    fn empty_detection_set_is_success() {
        let pipeline = FramePipeline::with_backend(StubBackend::with_candidates(vec![]));
        let outcome = pipeline
            .process_frame(&frame(), Threshold::new(0.5).unwrap())
            .unwrap();

        assert!(outcome.detections.is_empty());
        assert!(outcome.unique_labels.is_empty());
        // Nothing to draw, so the annotated copy matches the input.
        assert_eq!(outcome.annotated.data(), frame().data());
    }

    #[test]
    fn process_frame_is_deterministic() {
        let pipeline =
            FramePipeline::with_backend(StubBackend::with_candidates(overlapping_cat_cat_dog()));
        let threshold = Threshold::new(0.5).unwrap();

        let first = pipeline.process_frame(&frame(), threshold).unwrap();
        let second = pipeline.process_frame(&frame(), threshold).unwrap();

        assert_eq!(first.detections, second.detections);
        assert_eq!(first.unique_labels, second.unique_labels);
        assert_eq!(first.annotated.data(), second.annotated.data());
    }

    #[test]
    fn raising_threshold_never_increases_count() {
        let pipeline =
            FramePipeline::with_backend(StubBackend::with_candidates(overlapping_cat_cat_dog()));

        let at_low = pipeline
            .process_frame(&frame(), Threshold::new(0.1).unwrap())
            .unwrap();
        let at_high = pipeline
            .process_frame(&frame(), Threshold::new(0.9).unwrap())
            .unwrap();

        assert!(at_high.detections.len() <= at_low.detections.len());
        // Everything admitted at 0.9 was admitted at 0.1.
        for det in &at_high.detections {
            assert!(at_low.detections.contains(det));
        }
    }

    #[test]
    fn input_frame_is_never_mutated() {
        let input = frame();
        let before = input.data().to_vec();
        let pipeline =
            FramePipeline::with_backend(StubBackend::with_candidates(overlapping_cat_cat_dog()));
        let _ = pipeline
            .process_frame(&input, Threshold::new(0.5).unwrap())
            .unwrap();
        assert_eq!(input.data(), before.as_slice());
    }

    struct BrokenBackend;

    impl DetectorBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(
            &mut self,
            _pixels: &[u8],
            _width: u32,
            _height: u32,
            _threshold: Threshold,
        ) -> Result<Vec<Detection>> {
            Err(anyhow!("inference engine exploded"))
        }
    }

    #[test]
    fn backend_failure_propagates_as_model_error() {
        let pipeline = FramePipeline::with_backend(BrokenBackend);
        let err = pipeline
            .process_frame(&frame(), Threshold::new(0.5).unwrap())
            .unwrap_err();
        let PipelineError::Model(inner) = err;
        assert!(inner.to_string().contains("inference engine exploded"));
    }
}
