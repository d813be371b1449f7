/// One detected object, as reported by a backend. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Class label, e.g. "cat".
    pub label: String,
    /// Confidence score in `[0, 1]`.
    pub confidence: f32,
    /// Location in pixel coordinates of the detected frame.
    pub bbox: BoundingBox,
}

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}
