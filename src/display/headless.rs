use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use super::{Display, StopSignal};
use crate::frame::ColorFrame;

/// Windowless display. Stops on its `StopSignal` (Ctrl-C) and can dump every rendered
/// frame as `frame_000000.png`, `frame_000001.png`, ... into a directory.
pub struct HeadlessDisplay {
    stop: StopSignal,
    dump_dir: Option<PathBuf>,
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            stop,
            dump_dir: None,
            shown: 0,
        }
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Frames rendered so far.
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn open(&mut self) -> Result<()> {
        if let Some(dir) = &self.dump_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create dump directory {}", dir.display()))?;
            log::info!("headless display: writing frames to {}", dir.display());
        }
        Ok(())
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<()> {
        if let Some(dir) = &self.dump_dir {
            let path = dir.join(format!("frame_{:06}.png", self.shown));
            frame
                .image()
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        self.shown += 1;
        Ok(())
    }

    fn wait_for_stop(&mut self, wait: Duration) -> Result<bool> {
        if self.stop.is_set() {
            return Ok(true);
        }
        std::thread::sleep(wait);
        Ok(self.stop.is_set())
    }

    fn close(&mut self) {
        log::debug!("headless display closed after {} frames", self.shown);
    }
}
