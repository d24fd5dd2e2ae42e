//! Still-image edits: crop, resize, brighten, watermark and horizontal combine.
//!
//! Every operation takes decoded images and returns a new image; reading and writing
//! files is left to the caller ([`load`] / [`save`] cover the common case).

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};

/// Watermarks are scaled to this square size before compositing.
pub const WATERMARK_SIZE: u32 = 50;

pub fn load(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to read image {}", path.display()))
}

/// Write `img`, dropping the alpha channel for formats that cannot store it.
pub fn save(img: &DynamicImage, path: &Path) -> Result<()> {
    let opaque_only = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "bmp"))
        .unwrap_or(false);
    let result = if opaque_only && img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.to_rgb8()).save(path)
    } else {
        img.save(path)
    };
    result.with_context(|| format!("failed to write image {}", path.display()))
}

/// Crop to the box `[left, right) x [top, bottom)`. Parts of the box outside the source
/// come out as transparent black.
pub fn crop(img: &DynamicImage, left: i64, top: i64, right: i64, bottom: i64) -> Result<DynamicImage> {
    if right <= left || bottom <= top {
        bail!(
            "crop box ({}, {}, {}, {}) is empty",
            left,
            top,
            right,
            bottom
        );
    }
    let width = u32::try_from(right - left).context("crop box is too wide")?;
    let height = u32::try_from(bottom - top).context("crop box is too tall")?;

    let inside = left >= 0
        && top >= 0
        && right <= img.width() as i64
        && bottom <= img.height() as i64;
    if inside {
        return Ok(img.crop_imm(left as u32, top as u32, width, height));
    }

    let mut canvas = RgbaImage::new(width, height);
    imageops::replace(&mut canvas, &img.to_rgba8(), -left, -top);
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Resample to exactly `width x height` with a Lanczos filter.
pub fn resize(img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    if width == 0 || height == 0 {
        bail!("target size {}x{} must be non-zero", width, height);
    }
    Ok(img.resize_exact(width, height, FilterType::Lanczos3))
}

/// Scale every color channel by `factor` (clamped to 0..=255). Alpha is kept as is.
pub fn brighten(img: &DynamicImage, factor: f32) -> Result<DynamicImage> {
    if !factor.is_finite() || factor < 0.0 {
        bail!("brightness factor must be a non-negative number (got {})", factor);
    }
    let mut rgba = img.to_rgba8();
    for px in rgba.pixels_mut() {
        for channel in px.0.iter_mut().take(3) {
            *channel = (*channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    let out = DynamicImage::ImageRgba8(rgba);
    if img.color().has_alpha() {
        Ok(out)
    } else {
        Ok(DynamicImage::ImageRgb8(out.to_rgb8()))
    }
}

/// Composite `mark` onto `base` near the bottom-right corner.
///
/// The mark is scaled to 50x50, its alpha multiplied by `transparency / 100`
/// (`0..=100`), and blended at `(W - 100, H - 100)`.
pub fn watermark(base: &DynamicImage, mark: &DynamicImage, transparency: u8) -> Result<DynamicImage> {
    if transparency > 100 {
        bail!("transparency must be between 0 and 100 (got {})", transparency);
    }
    let mut mark = mark
        .resize_exact(WATERMARK_SIZE, WATERMARK_SIZE, FilterType::Lanczos3)
        .to_rgba8();
    for px in mark.pixels_mut() {
        px.0[3] = (px.0[3] as u32 * transparency as u32 / 100) as u8;
    }

    let mut canvas = base.to_rgba8();
    let x = base.width() as i64 - 2 * WATERMARK_SIZE as i64;
    let y = base.height() as i64 - 2 * WATERMARK_SIZE as i64;
    imageops::overlay(&mut canvas, &mark, x, y);

    let out = DynamicImage::ImageRgba8(canvas);
    if base.color().has_alpha() {
        Ok(out)
    } else {
        Ok(DynamicImage::ImageRgb8(out.to_rgb8()))
    }
}

/// Place `images` side by side, top-aligned, on a black canvas as wide as all of them
/// and as tall as the tallest.
pub fn combine_horizontal(images: &[DynamicImage]) -> Result<RgbImage> {
    if images.is_empty() {
        return Err(anyhow!("nothing to combine"));
    }
    let total_width: u32 = images.iter().map(|img| img.width()).sum();
    let max_height = images.iter().map(|img| img.height()).max().unwrap_or(0);

    let mut canvas = RgbImage::new(total_width, max_height);
    let mut x_offset = 0i64;
    for img in images {
        imageops::replace(&mut canvas, &img.to_rgb8(), x_offset, 0);
        x_offset += img.width() as i64;
    }
    Ok(canvas)
}
