//! Multi-scale sliding-window evaluation.

use std::borrow::Cow;

use image::GrayImage;

use super::integral::Integral;
use super::{HaarCascade, ScanParams};
use crate::detect::Detection;

/// Outcome of evaluating the cascade at one window position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WindowVerdict {
    Accepted,
    /// Rejected by the stage with this index.
    Rejected(usize),
}

impl HaarCascade {
    pub(crate) fn evaluate(&self, integral: &Integral, ox: i32, oy: i32) -> WindowVerdict {
        let norm = integral.norm_factor(ox, oy, self.window);
        for (si, stage) in self.stages.iter().enumerate() {
            let mut sum = 0.0f64;
            for weak in &stage.classifiers {
                let mut idx = 0i32;
                loop {
                    let node = &weak.nodes[idx as usize];
                    let value = integral.feature_value(&self.features[node.feature], ox, oy) * norm;
                    idx = if value < node.threshold as f64 {
                        node.left
                    } else {
                        node.right
                    };
                    if idx <= 0 {
                        break;
                    }
                }
                sum += weak.leaves[(-idx) as usize] as f64;
            }
            if sum < stage.threshold as f64 {
                return WindowVerdict::Rejected(si);
            }
        }
        WindowVerdict::Accepted
    }

    /// Raw (ungrouped) hits over every scale of the pyramid.
    pub(crate) fn scan(&self, image: &GrayImage, params: &ScanParams) -> Vec<Detection> {
        let (img_w, img_h) = image.dimensions();
        let (base_w, base_h) = self.window;
        let max_size = params.max_size.unwrap_or((img_w, img_h));
        let min_size = params.min_size.unwrap_or((0, 0));

        let mut hits = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let factor_now = factor;
            factor *= params.scale_factor;

            let win_w = round(base_w as f64 * factor_now);
            let win_h = round(base_h as f64 * factor_now);
            if win_w > max_size.0 as i64 || win_h > max_size.1 as i64 {
                break;
            }
            let scaled_w = round(img_w as f64 / factor_now);
            let scaled_h = round(img_h as f64 / factor_now);
            if scaled_w < base_w as i64 || scaled_h < base_h as i64 {
                break;
            }
            if win_w < min_size.0 as i64 || win_h < min_size.1 as i64 {
                continue;
            }

            let scaled: Cow<'_, GrayImage> = if scaled_w == img_w as i64 && scaled_h == img_h as i64 {
                Cow::Borrowed(image)
            } else {
                Cow::Owned(resize_linear(image, scaled_w as u32, scaled_h as u32))
            };
            let integral = Integral::new(&scaled, self.has_tilted);

            let step = if factor_now > 2.0 { 1 } else { 2 };
            let range_w = integral.width() as i32 - base_w as i32 + 1;
            let range_h = integral.height() as i32 - base_h as i32 + 1;

            let mut y = 0;
            while y < range_h {
                let mut x = 0;
                while x < range_w {
                    match self.evaluate(&integral, x, y) {
                        WindowVerdict::Accepted => hits.push(Detection::new(
                            round(x as f64 * factor_now) as i32,
                            round(y as f64 * factor_now) as i32,
                            win_w as i32,
                            win_h as i32,
                        )),
                        // Failing the very first stage: skip the neighbor too.
                        WindowVerdict::Rejected(0) => x += step,
                        WindowVerdict::Rejected(_) => {}
                    }
                    x += step;
                }
                y += step;
            }
        }
        hits
    }
}

fn round(v: f64) -> i64 {
    v.round_ties_even() as i64
}

/// Fractional bits of the fixed-point interpolation weights.
const RESIZE_COEF_BITS: u32 = 11;
const RESIZE_COEF_SCALE: i64 = 1 << RESIZE_COEF_BITS;
/// Rounding shift after both passes (weights multiply twice).
const RESIZE_SHIFT: u32 = RESIZE_COEF_BITS * 2;

/// Two-tap sampling plan along one axis: `(first source index, w0, w1)`.
///
/// Destination pixel `d` samples source position `(d + 0.5) * src/dst - 0.5`, clamped
/// to the edge pixels (OpenCV `INTER_LINEAR`).
fn linear_taps(src_len: u32, dst_len: u32) -> Vec<(usize, i64, i64)> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let pos = (d as f64 + 0.5) * scale - 0.5;
            let mut first = pos.floor() as i64;
            let mut frac = pos - first as f64;
            if first < 0 {
                first = 0;
                frac = 0.0;
            }
            if first >= src_len as i64 - 1 {
                first = src_len as i64 - 1;
                frac = 0.0;
            }
            let w0 = ((1.0 - frac) * RESIZE_COEF_SCALE as f64).round() as i64;
            (first as usize, w0, RESIZE_COEF_SCALE - w0)
        })
        .collect()
}

/// Bilinear resample with OpenCV's pixel mapping and fixed-point rounding.
pub(crate) fn resize_linear(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return GrayImage::new(width, height);
    }
    let xs = linear_taps(src_w, width);
    let ys = linear_taps(src_h, height);
    let src = image.as_raw();
    let stride = src_w as usize;

    let horizontal = |row: usize| -> Vec<i64> {
        let line = &src[row * stride..(row + 1) * stride];
        xs.iter()
            .map(|&(sx, w0, w1)| {
                let next = if w1 != 0 { line[sx + 1] as i64 } else { 0 };
                line[sx] as i64 * w0 + next * w1
            })
            .collect()
    };

    let mut out = GrayImage::new(width, height);
    let mut cached: Option<(usize, Vec<i64>)> = None;
    for (dy, &(sy, w0, w1)) in ys.iter().enumerate() {
        let top = match cached.take() {
            Some((row, values)) if row == sy => values,
            _ => horizontal(sy),
        };
        let bottom = if w1 != 0 { Some(horizontal(sy + 1)) } else { None };
        for (dx, &t) in top.iter().enumerate() {
            let b = bottom.as_ref().map_or(0, |values| values[dx]);
            let v = (t * w0 + b * w1 + (1 << (RESIZE_SHIFT - 1))) >> RESIZE_SHIFT;
            out.put_pixel(dx as u32, dy as u32, image::Luma([v.clamp(0, 255) as u8]));
        }
        cached = Some(match bottom {
            Some(values) => (sy + 1, values),
            None => (sy, top),
        });
    }
    out
}
