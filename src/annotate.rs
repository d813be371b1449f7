//! Detection overlay rendering.
//!
//! Draws bounding boxes and a filled label tag onto a copy of the input
//! frame. Each class label maps to a stable color, so the same class always
//! draws the same way across frames.

use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;

const BOX_THICKNESS: i32 = 2;
const TAG_HEIGHT: i32 = 6;

const PALETTE: [[u8; 3]; 6] = [
    [0, 255, 255],
    [255, 64, 64],
    [64, 255, 64],
    [255, 200, 0],
    [180, 64, 255],
    [64, 128, 255],
];

/// Render `detections` onto a copy of `frame`. The input is untouched.
pub fn render(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut img = frame.to_rgb_image();
    let (width, height) = (frame.width() as i32, frame.height() as i32);

    for det in detections {
        let color = Rgb(label_color(&det.label));

        // Clamp to the frame; detectors may report boxes that spill past an
        // edge after coordinate scaling.
        let x0 = (det.bbox.x as i32).clamp(0, width - 1);
        let y0 = (det.bbox.y as i32).clamp(0, height - 1);
        let x1 = ((det.bbox.x + det.bbox.w) as i32).clamp(0, width);
        let y1 = ((det.bbox.y + det.bbox.h) as i32).clamp(0, height);
        if x1 - x0 < 2 || y1 - y0 < 2 {
            continue;
        }

        for inset in 0..BOX_THICKNESS {
            let w = (x1 - x0) - 2 * inset;
            let h = (y1 - y0) - 2 * inset;
            if w < 1 || h < 1 {
                break;
            }
            let rect = Rect::at(x0 + inset, y0 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, color);
        }

        // Label tag above the box when there is room for one.
        let tag_top = y0 - TAG_HEIGHT;
        if tag_top >= 0 {
            let tag = Rect::at(x0, tag_top).of_size((x1 - x0) as u32, TAG_HEIGHT as u32);
            draw_filled_rect_mut(&mut img, tag, color);
        }
    }

    // Dimensions are unchanged, so the frame invariant holds.
    Frame::from_rgb_image(img).expect("annotated frame keeps input dimensions")
}

/// Stable per-label color.
fn label_color(label: &str) -> [u8; 3] {
    let mut h: u32 = 2166136261;
    for b in label.bytes() {
        h = (h ^ b as u32).wrapping_mul(16777619);
    }
    PALETTE[(h % PALETTE.len() as u32) as usize]
}
