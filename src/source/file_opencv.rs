//! Local video file decoding through OpenCV `VideoCapture`.

use anyhow::{anyhow, bail, Context, Result};
use opencv::core::{Mat, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::{FrameSource, SourceStats};
use crate::frame::ColorFrame;

pub(crate) struct OpencvFileSource {
    path: String,
    capture: Option<VideoCapture>,
    frame_count: u64,
}

impl OpencvFileSource {
    pub(crate) fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            capture: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for OpencvFileSource {
    fn connect(&mut self) -> Result<()> {
        let capture = VideoCapture::from_file(&self.path, videoio::CAP_ANY)
            .with_context(|| format!("unable to open video '{}'", self.path))?;
        if !capture.is_opened()? {
            bail!("unable to open video '{}'", self.path);
        }
        self.capture = Some(capture);
        log::info!("FileSource: connected to {} (opencv)", self.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| anyhow!("video {} is not open", self.path))?;
        let mut mat = Mat::default();
        let grabbed = capture.read(&mut mat).context("read video frame")?;
        if !grabbed || mat.empty() {
            return Ok(None);
        }
        let frame = mat_to_frame(&mat, self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                log::warn!("FileSource: releasing {} failed: {}", self.path, err);
            }
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.path.clone(),
        }
    }
}

/// BGR `Mat` to an RGB frame.
fn mat_to_frame(mat: &Mat, index: u64) -> Result<ColorFrame> {
    if mat.typ() != CV_8UC3 {
        bail!("unsupported frame type {} (expected 8-bit BGR)", mat.typ());
    }
    let owned;
    let mat = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone().context("copy non-continuous frame")?;
        &owned
    };
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let mut pixels = mat.data_bytes().context("frame bytes")?.to_vec();
    for px in pixels.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    ColorFrame::from_rgb_bytes(pixels, width, height, index)
}
