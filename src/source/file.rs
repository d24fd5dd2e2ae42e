//! Local file frame source.
//!
//! `FileSource` picks a backend from the path:
//! - `stub://N`: synthetic frames (tests, demos)
//! - `.png` / `.jpg` / `.jpeg` / `.bmp`: a single still frame
//! - anything else: a video decoded by FFmpeg (feature `video-ffmpeg`) or, failing
//!   that, by OpenCV (feature `opencv`)
//!
//! Only local paths are accepted. Nothing is opened until `connect`.

use std::path::Path;

use anyhow::{anyhow, Result};

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
#[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
use super::file_opencv::OpencvFileSource;
use super::still::{is_still_image, StillImageSource};
use super::synthetic::SyntheticSource;
use super::{FrameSource, SourceStats};
use crate::frame::ColorFrame;

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Still(StillImageSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
    #[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
    Opencv(OpencvFileSource),
}

impl FileSource {
    pub fn new(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "video source only supports local paths (no URL schemes): '{}'",
                path
            ));
        }
        let backend = if path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticSource::new(path)?)
        } else if is_still_image(Path::new(path)) {
            FileBackend::Still(StillImageSource::new(path))
        } else {
            video_backend(path)?
        };
        Ok(Self { backend })
    }

    /// Backend label (for logs).
    pub fn kind(&self) -> &'static str {
        match &self.backend {
            FileBackend::Synthetic(_) => "synthetic",
            FileBackend::Still(_) => "still",
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(_) => "ffmpeg",
            #[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
            FileBackend::Opencv(_) => "opencv",
        }
    }

    fn inner(&mut self) -> &mut dyn FrameSource {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source,
            FileBackend::Still(source) => source,
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source,
            #[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
            FileBackend::Opencv(source) => source,
        }
    }
}

#[cfg(feature = "video-ffmpeg")]
fn video_backend(path: &str) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegFileSource::new(path)))
}

#[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
fn video_backend(path: &str) -> Result<FileBackend> {
    Ok(FileBackend::Opencv(OpencvFileSource::new(path)))
}

#[cfg(not(any(feature = "video-ffmpeg", feature = "opencv")))]
fn video_backend(path: &str) -> Result<FileBackend> {
    Err(anyhow!(
        "decoding video '{}' requires the video-ffmpeg or opencv feature",
        path
    ))
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        self.inner().connect()
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        self.inner().next_frame()
    }

    fn release(&mut self) {
        self.inner().release()
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            FileBackend::Still(source) => source.stats(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
            #[cfg(all(feature = "opencv", not(feature = "video-ffmpeg")))]
            FileBackend::Opencv(source) => source.stats(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_path() -> Result<()> {
        assert_eq!(FileSource::new("stub://5")?.kind(), "synthetic");
        assert_eq!(FileSource::new("cars.jpg")?.kind(), "still");
        Ok(())
    }

    #[test]
    fn rejects_remote_and_empty_paths() {
        assert!(FileSource::new("rtsp://camera/stream").is_err());
        assert!(FileSource::new("https://example.com/video.mp4").is_err());
        assert!(FileSource::new("  ").is_err());
    }

    #[cfg(not(any(feature = "video-ffmpeg", feature = "opencv")))]
    #[test]
    fn video_without_decoder_feature_is_an_error() {
        assert!(FileSource::new("video.avi").is_err());
    }

    #[test]
    fn synthetic_backend_reads_through() -> Result<()> {
        let mut source = FileSource::new("stub://2")?;
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        source.release();
        assert_eq!(source.stats().frames_read, 2);
        Ok(())
    }
}
