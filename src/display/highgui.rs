//! On-screen window through OpenCV highgui.

use std::time::Duration;

use anyhow::{Context, Result};
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::prelude::*;

use super::{Display, StopSignal};
use crate::frame::ColorFrame;

const KEY_ESC: i32 = 27;

/// Named highgui window. `q`, Esc, closing the window or Ctrl-C stop the loop.
pub struct HighguiDisplay {
    title: String,
    stop: StopSignal,
    open: bool,
}

impl HighguiDisplay {
    pub fn new(title: impl Into<String>, stop: StopSignal) -> Self {
        Self {
            title: title.into(),
            stop,
            open: false,
        }
    }
}

impl Display for HighguiDisplay {
    fn open(&mut self) -> Result<()> {
        highgui::named_window(&self.title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to create window '{}'", self.title))?;
        self.open = true;
        Ok(())
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(&self.title, &mat).context("render frame")?;
        Ok(())
    }

    fn wait_for_stop(&mut self, wait: Duration) -> Result<bool> {
        let ms = wait.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key = highgui::wait_key(ms).context("poll window events")? & 0xFF;
        if key == 'q' as i32 || key == KEY_ESC || self.stop.is_set() {
            return Ok(true);
        }
        let visible = highgui::get_window_property(&self.title, highgui::WND_PROP_VISIBLE)
            .context("query window state")?;
        Ok(visible < 1.0)
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = highgui::destroy_window(&self.title) {
            log::warn!("failed to close window '{}': {}", self.title, err);
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// RGB frame to a BGR `Mat`.
fn frame_to_mat(frame: &ColorFrame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )
    .context("allocate frame buffer")?;
    let dst = mat.data_bytes_mut().context("frame buffer bytes")?;
    for (out, px) in dst.chunks_exact_mut(3).zip(frame.as_rgb_bytes().chunks_exact(3)) {
        out[0] = px[2];
        out[1] = px[1];
        out[2] = px[0];
    }
    Ok(mat)
}
