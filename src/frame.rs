//! Decoded frame representation.
//!
//! A `Frame` is the canonical in-memory raster every component exchanges:
//! tightly packed RGB8, row-major. Uploads are decoded into it via the
//! `image` crate; camera sources produce it directly. Ownership is
//! transient: whichever component last produced a frame owns it, and the
//! pipeline never mutates one in place.

use std::path::Path;

use image::{DynamicImage, RgbImage};

use crate::error::DecodeError;

/// Decoded RGB8 raster. `data.len() == width * height * 3`, always.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Build a frame from raw RGB8 bytes.
    ///
    /// Rejects empty rasters and buffers that do not match the stated
    /// dimensions, so every `Frame` in circulation satisfies the length
    /// invariant.
    pub fn from_rgb8(data: Vec<u8>, width: u32, height: u32) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 || data.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(3))
            .ok_or(DecodeError::EmptyFrame)?;
        if data.len() != expected {
            return Err(DecodeError::DimensionMismatch {
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an uploaded image (JPEG or PNG) into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let img = image::load_from_memory(bytes)?;
        Self::from_dynamic(img)
    }

    /// Read and decode an image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    fn from_dynamic(img: DynamicImage) -> Result<Self, DecodeError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_rgb8(rgb.into_raw(), width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy into an `image` buffer, e.g. for drawing or encoding to disk.
    pub fn to_rgb_image(&self) -> RgbImage {
        // The constructor enforced the length invariant.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame dimensions match buffer")
    }

    pub(crate) fn from_rgb_image(img: RgbImage) -> Result<Self, DecodeError> {
        let (width, height) = img.dimensions();
        Self::from_rgb8(img.into_raw(), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn checker_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn from_rgb8_rejects_empty_raster() {
        assert!(matches!(
            Frame::from_rgb8(vec![], 0, 0),
            Err(DecodeError::EmptyFrame)
        ));
        assert!(matches!(
            Frame::from_rgb8(vec![], 4, 4),
            Err(DecodeError::EmptyFrame)
        ));
    }

    #[test]
    fn from_rgb8_rejects_mismatched_buffer() {
        let err = Frame::from_rgb8(vec![0u8; 10], 4, 4).unwrap_err();
        assert!(matches!(err, DecodeError::DimensionMismatch { len: 10, .. }));
    }

    #[test]
    fn decodes_png_bytes() {
        let img = checker_image(8, 6);
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png)
            .expect("encode png");

        let frame = Frame::decode(bytes.get_ref()).expect("decode png");
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 6);
        assert_eq!(frame.data().len(), 8 * 6 * 3);
    }

    #[test]
    fn corrupt_upload_is_a_decode_error() {
        let err = Frame::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn round_trips_through_rgb_image() {
        let frame = Frame::from_rgb8(vec![7u8; 4 * 3 * 3], 4, 3).unwrap();
        let back = Frame::from_rgb_image(frame.to_rgb_image()).unwrap();
        assert_eq!(frame, back);
    }
}
