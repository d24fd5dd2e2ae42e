//! Frame sources.
//!
//! This module provides the sources the detection loop can read from:
//! - Synthetic `stub://N` sequences (testing)
//! - Still images (`png`, `jpg`, `jpeg`, `bmp`), read as a one-frame sequence
//! - Local video files through FFmpeg (feature: video-ffmpeg)
//! - Local video files through OpenCV `VideoCapture` (feature: opencv)
//!
//! A source is opened once, read sequentially until it is exhausted or a read fails,
//! and released exactly once by its owner. Sources never retry and never seek.

pub mod file;
#[cfg(feature = "video-ffmpeg")]
mod file_ffmpeg;
#[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
mod file_opencv;
pub mod still;
pub mod synthetic;

use anyhow::Result;

use crate::frame::ColorFrame;

pub use file::FileSource;
pub use still::StillImageSource;
pub use synthetic::SyntheticSource;

/// Sequential producer of color frames.
pub trait FrameSource {
    /// Acquire the underlying resource (open the file, start the decoder).
    fn connect(&mut self) -> Result<()>;

    /// Next frame in order. `Ok(None)` marks a clean end of stream; `Err` is a read or
    /// decode failure.
    fn next_frame(&mut self) -> Result<Option<ColorFrame>>;

    /// Release the underlying resource. Called once by the owner after a successful
    /// `connect`.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub path: String,
}
