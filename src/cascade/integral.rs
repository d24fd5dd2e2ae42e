//! Summed-area tables for one scale of the image pyramid.

use image::GrayImage;

use super::{Feature, WeightedRect};

/// Upright sum, squared sum and (optionally) 45°-rotated sum tables.
///
/// All tables are `(height + 1) x (width + 1)` with a zero first row and column.
pub(crate) struct Integral {
    width: u32,
    height: u32,
    stride: usize,
    sum: Vec<u64>,
    sqsum: Vec<u64>,
    tilted: Option<Vec<i64>>,
}

impl Integral {
    pub fn new(image: &GrayImage, with_tilted: bool) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let rows = height as usize + 1;
        let mut sum = vec![0u64; stride * rows];
        let mut sqsum = vec![0u64; stride * rows];

        for y in 0..height as usize {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width as usize {
                let v = image.get_pixel(x as u32, y as u32).0[0] as u64;
                row_sum += v;
                row_sq += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sqsum[at] = sqsum[at - stride] + row_sq;
            }
        }

        let tilted = with_tilted.then(|| tilted_table(image));
        Self {
            width,
            height,
            stride,
            sum,
            sqsum,
            tilted,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn at(&self, x: i32, y: i32) -> usize {
        y as usize * self.stride + x as usize
    }

    fn upright(&self, table: &[u64], x: i32, y: i32, w: i32, h: i32) -> u64 {
        (table[self.at(x, y)] + table[self.at(x + w, y + h)])
            - (table[self.at(x + w, y)] + table[self.at(x, y + h)])
    }

    /// Pixel sum over an upright rectangle in image coordinates.
    pub fn rect_sum(&self, x: i32, y: i32, w: i32, h: i32) -> u64 {
        self.upright(&self.sum, x, y, w, h)
    }

    pub fn rect_sqsum(&self, x: i32, y: i32, w: i32, h: i32) -> u64 {
        self.upright(&self.sqsum, x, y, w, h)
    }

    /// Pixel sum over a 45°-rotated rectangle whose top corner is `(x, y)`.
    fn tilted_sum(&self, table: &[i64], x: i32, y: i32, w: i32, h: i32) -> i64 {
        table[self.at(x, y)] - table[self.at(x - h, y + h)] - table[self.at(x + w, y + w)]
            + table[self.at(x + w - h, y + w + h)]
    }

    /// Inverse of the standard deviation term used to normalize feature responses for
    /// the window at `(ox, oy)` with size `window`.
    pub fn norm_factor(&self, ox: i32, oy: i32, window: (u32, u32)) -> f64 {
        let (w, h) = (window.0 as i32 - 2, window.1 as i32 - 2);
        let area = (w * h) as f64;
        let s = self.rect_sum(ox + 1, oy + 1, w, h) as f64;
        let sq = self.rect_sqsum(ox + 1, oy + 1, w, h) as f64;
        let nf = area * sq - s * s;
        if nf > 0.0 {
            1.0 / nf.sqrt()
        } else {
            1.0
        }
    }

    /// Weighted rectangle sum of `feature` for the window at `(ox, oy)`.
    pub fn feature_value(&self, feature: &Feature, ox: i32, oy: i32) -> f64 {
        let rect_value = |r: &WeightedRect| -> f64 {
            let (x, y) = (ox + r.x, oy + r.y);
            let total = match (&self.tilted, feature.tilted) {
                (Some(table), true) => self.tilted_sum(table, x, y, r.width, r.height) as f64,
                _ => self.rect_sum(x, y, r.width, r.height) as f64,
            };
            r.weight as f64 * total
        };
        feature.rects.iter().map(rect_value).sum()
    }
}

/// Rotated summed-area table:
/// `T(X, Y) = sum of I(x, y) for y < Y and |x - X + 1| <= Y - y - 1`.
///
/// Evaluated row by row with
/// `T(X, Y) = T(X-1, Y-1) + T(X+1, Y-1) - T(X, Y-2) + I(X-1, Y-1) + I(X-1, Y-2)`
/// on a grid widened by `height + 1` columns per side so the cones of edge columns
/// are complete, then cropped to `(height + 1) x (width + 1)`.
fn tilted_table(image: &GrayImage) -> Vec<i64> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let margin = height + 1;
    let ext_w = (width + 2 * margin + 1) as usize;
    let rows = (height + 1) as usize;
    let mut ext = vec![0i64; ext_w * rows];

    let pixel = |x: i64, y: i64| -> i64 {
        if x < 0 || y < 0 || x >= width || y >= height {
            0
        } else {
            image.get_pixel(x as u32, y as u32).0[0] as i64
        }
    };

    for y in 1..rows {
        for cx in 1..ext_w - 1 {
            let x = cx as i64 - margin;
            let above = (y - 1) * ext_w;
            let two_above = if y >= 2 { ext[(y - 2) * ext_w + cx] } else { 0 };
            ext[y * ext_w + cx] = ext[above + cx - 1] + ext[above + cx + 1] - two_above
                + pixel(x - 1, y as i64 - 1)
                + pixel(x - 1, y as i64 - 2);
        }
    }

    let stride = width as usize + 1;
    let mut table = vec![0i64; stride * rows];
    for y in 0..rows {
        let src = y * ext_w + margin as usize;
        table[y * stride..(y + 1) * stride].copy_from_slice(&ext[src..src + stride]);
    }
    table
}
