//! Frame types flowing through the detection loop.
//!
//! - `ColorFrame`: RGB8 pixel grid plus its position in the source sequence.
//! - `GrayFrame`: single-channel luma grid derived from a `ColorFrame`.
//!
//! A frame has no identity beyond its index. It is produced fresh by a source each
//! iteration, annotated in place, rendered, and dropped.

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};

/// Fixed-point BT.601 weights used by OpenCV's `COLOR_BGR2GRAY` for 8-bit input.
/// Reproduced bit-for-bit.
const R2Y: u32 = 4899;
const G2Y: u32 = 9617;
const B2Y: u32 = 1868;
const YUV_SHIFT: u32 = 14;
const YUV_ROUND: u32 = 1 << (YUV_SHIFT - 1);

// ----------------------------------------------------------------------------
// ColorFrame
// ----------------------------------------------------------------------------

/// A decoded color frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorFrame {
    image: RgbImage,
    /// Zero-based position in the source sequence.
    pub index: u64,
}

impl ColorFrame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    /// Build a frame from packed RGB24 bytes (row-major, no stride padding).
    pub fn from_rgb_bytes(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("invalid {}x{} RGB buffer", width, height))?;
        Ok(Self { image, index })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB24 bytes.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Luma conversion, bit-exact with OpenCV's 8-bit BGR→GRAY.
    pub fn to_gray(&self) -> GrayFrame {
        let (width, height) = self.image.dimensions();
        let mut gray = GrayImage::new(width, height);
        for (dst, src) in gray.pixels_mut().zip(self.image.pixels()) {
            let [r, g, b] = src.0;
            *dst = Luma([luma(r, g, b)]);
        }
        GrayFrame {
            image: gray,
            index: self.index,
        }
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32 * R2Y + g as u32 * G2Y + b as u32 * B2Y + YUV_ROUND) >> YUV_SHIFT;
    y.min(255) as u8
}

// ----------------------------------------------------------------------------
// GrayFrame
// ----------------------------------------------------------------------------

/// Single-channel frame handed to classifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayFrame {
    image: GrayImage,
    pub index: u64,
}

impl GrayFrame {
    pub fn new(image: GrayImage, index: u64) -> Self {
        Self { image, index }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}
