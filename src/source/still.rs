use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::ColorFrame;

const STILL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// True when `path` names a still image the `image` crate can decode.
pub fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STILL_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// One decoded image presented as a single-frame sequence.
pub struct StillImageSource {
    path: PathBuf,
    pending: Option<ColorFrame>,
    frames_read: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: None,
            frames_read: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        if !self.path.is_file() {
            bail!("image {} does not exist", self.path.display());
        }
        let image = image::open(&self.path)
            .with_context(|| format!("failed to decode image {}", self.path.display()))?
            .to_rgb8();
        log::info!(
            "FileSource: connected to {} (still {}x{})",
            self.path.display(),
            image.width(),
            image.height()
        );
        self.pending = Some(ColorFrame::new(image, 0));
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        let frame = self.pending.take();
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        self.pending = None;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            path: self.path.display().to_string(),
        }
    }
}
