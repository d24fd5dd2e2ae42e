use anyhow::{anyhow, bail, Result};
use image::RgbImage;

use super::{FrameSource, SourceStats};
use crate::frame::ColorFrame;

const DEFAULT_FRAME_COUNT: u64 = 100;
const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Deterministic `stub://N` sequence of `N` gradient frames (100 when `N` is omitted).
pub struct SyntheticSource {
    path: String,
    total: u64,
    frame_count: u64,
    scene_state: u8,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(path: &str) -> Result<Self> {
        let count = path
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source paths start with stub:// (got '{}')", path))?;
        let total = if count.trim().is_empty() {
            DEFAULT_FRAME_COUNT
        } else {
            count.trim()
                .parse()
                .map_err(|_| anyhow!("stub:// frame count must be an integer (got '{}')", count))?
        };
        Ok(Self::with_frames(path, total))
    }

    pub fn with_frames(path: &str, total: u64) -> Self {
        Self {
            path: path.to_string(),
            total,
            frame_count: 0,
            scene_state: 0,
            connected: false,
        }
    }

    fn generate(&mut self) -> RgbImage {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let offset = self.frame_count + self.scene_state as u64;
        RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            let base = (y as u64 * WIDTH as u64 + x as u64) * 3 + offset;
            image::Rgb([
                (base % 256) as u8,
                ((base + 1) % 256) as u8,
                ((base + 2) % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.path);
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        if !self.connected {
            bail!("synthetic source {} is not connected", self.path);
        }
        if self.frame_count >= self.total {
            return Ok(None);
        }
        let image = self.generate();
        let frame = ColorFrame::new(image, self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_requested_count_then_ends() -> Result<()> {
        let mut source = SyntheticSource::new("stub://3")?;
        source.connect()?;
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame()? {
            assert_eq!((frame.width(), frame.height()), (WIDTH, HEIGHT));
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.stats().frames_read, 3);
        Ok(())
    }

    #[test]
    fn default_count_and_bad_count() {
        assert_eq!(SyntheticSource::new("stub://").unwrap().total, DEFAULT_FRAME_COUNT);
        assert!(SyntheticSource::new("stub://many").is_err());
    }

    #[test]
    fn reading_before_connect_fails() {
        let mut source = SyntheticSource::with_frames("stub://1", 1);
        assert!(source.next_frame().is_err());
    }
}
