//! Box overlay drawn on color frames.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::{Detection, Profile};
use crate::frame::ColorFrame;

pub const DEFAULT_THICKNESS: u32 = 2;

/// Outline color and stroke width.
///
/// The stroke grows inward from the detection's edges, so a box never paints outside
/// its own rectangle. OpenCV's `rectangle` centers the stroke on the edge instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl BoxStyle {
    pub fn new(color: Rgb<u8>, thickness: u32) -> Self {
        Self { color, thickness }
    }

    pub fn for_profile(profile: Profile) -> Self {
        Self::new(profile.color(), DEFAULT_THICKNESS)
    }
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

/// Outline every detection on `frame`.
///
/// A pixel of the closed rectangle `[x, x + w] x [y, y + h]` is painted when its
/// distance to the nearest edge is below `thickness`. Outlines are clipped to the frame.
pub fn draw_detections(frame: &mut ColorFrame, detections: &[Detection], style: &BoxStyle) {
    for det in detections {
        draw_box(frame, det, style);
    }
}

fn draw_box(frame: &mut ColorFrame, det: &Detection, style: &BoxStyle) {
    if det.width < 0 || det.height < 0 {
        return;
    }
    let image = frame.image_mut();
    for ring in 0..style.thickness as i64 {
        let w = det.width as i64 + 1 - 2 * ring;
        let h = det.height as i64 + 1 - 2 * ring;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(det.x + ring as i32, det.y + ring as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, style.color);
    }
}
