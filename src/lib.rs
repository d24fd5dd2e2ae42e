//! haarwatch
//!
//! Frame-by-frame object detection over a video with a Haar cascade classifier.
//!
//! # Architecture
//!
//! A single-threaded loop ([`watch::DetectionLoop`]) ties three collaborators together:
//!
//! 1. **Source** ([`source::FrameSource`]): yields color frames in order until the
//!    stream ends or a frame fails to decode.
//! 2. **Classifier** ([`detect::Classifier`]): an immutable value mapping a grayscale
//!    frame to rectangles. The production classifier is a native Haar cascade
//!    ([`cascade::HaarCascade`]) loaded from OpenCV XML.
//! 3. **Display** ([`display::Display`]): renders each annotated frame and reports
//!    operator stop requests.
//!
//! Frames are not buffered and detections are not linked across frames.
//!
//! # Module Structure
//!
//! - `frame`: color and grayscale frame types
//! - `source`: synthetic, still-image and video-file sources
//! - `cascade`: cascade loading and multi-scale evaluation
//! - `detect`: classifier trait, detections, profiles
//! - `annotate`: box overlay
//! - `display`: headless and windowed displays
//! - `watch`: the detection loop
//! - `config`: file + environment configuration
//! - `imageops`: still-image edits used by `imgedit`

pub mod annotate;
pub mod cascade;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod imageops;
pub mod source;
pub mod watch;

pub use annotate::{draw_detections, BoxStyle};
pub use cascade::{HaarCascade, ScanParams};
pub use config::WatchConfig;
pub use detect::{CascadeClassifier, Classifier, Detection, FixedClassifier, Profile};
#[cfg(feature = "opencv")]
pub use detect::OpencvCascadeClassifier;
pub use display::{Display, HeadlessDisplay, StopSignal};
#[cfg(feature = "opencv")]
pub use display::HighguiDisplay;
pub use frame::{ColorFrame, GrayFrame};
pub use source::{FileSource, FrameSource, SourceStats, StillImageSource, SyntheticSource};
pub use watch::{DetectionLoop, LoopError, LoopReport, LoopState, Termination};
