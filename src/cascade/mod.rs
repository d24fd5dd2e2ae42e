//! Native Haar cascade classifier.
//!
//! Loads OpenCV cascade XML (both the `opencv_traincascade` and the legacy
//! `opencv_haartraining` layouts) and runs the boosted-stage cascade over an image
//! pyramid the same way OpenCV's `CascadeClassifier::detectMultiScale` does:
//!
//! - scale the image down by `scale_factor^k` and slide the base window over it;
//! - evaluate variance-normalized Haar features against each stage;
//! - map accepted windows back to frame coordinates;
//! - merge the raw hits with `group_rectangles(min_neighbors, 0.2)`.
//!
//! A loaded cascade is immutable and can be shared across threads.

mod format;
mod group;
mod integral;
mod scan;
mod xml;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::GrayImage;

use crate::detect::Detection;

pub use group::{group_rectangles, GROUP_EPS};

/// Weighted rectangle of a Haar feature, relative to the detection window.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WeightedRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Feature {
    pub rects: Vec<WeightedRect>,
    /// Rotated by 45°; `(x, y)` is then the top corner.
    pub tilted: bool,
}

/// Decision-tree node. A child `> 0` is another node index; `<= 0` is `-(leaf index)`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Node {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WeakClassifier {
    pub nodes: Vec<Node>,
    pub leaves: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

/// Multi-scale scan parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanParams {
    /// Pyramid step; must be `> 1`.
    pub scale_factor: f64,
    /// A merged detection needs more than this many raw hits. `0` disables grouping.
    pub min_neighbors: u32,
    /// Smallest window considered, in frame pixels.
    pub min_size: Option<(u32, u32)>,
    /// Largest window considered (defaults to the frame size).
    pub max_size: Option<(u32, u32)>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: None,
            max_size: None,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_factor > 1.0) || !self.scale_factor.is_finite() {
            return Err(anyhow!(
                "scale_factor must be a finite value greater than 1 (got {})",
                self.scale_factor
            ));
        }
        Ok(())
    }
}

/// A trained Haar cascade.
#[derive(Clone, Debug)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<Feature>,
    has_tilted: bool,
}

impl HaarCascade {
    /// Load a cascade from an OpenCV XML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = fs::read_to_string(path)
            .with_context(|| format!("reading cascade {}", path.display()))?;
        Self::from_xml(&doc).with_context(|| format!("loading cascade {}", path.display()))
    }

    pub fn from_xml(doc: &str) -> Result<Self> {
        let root = xml::parse_document(doc)?;
        let parts = format::read_cascade(&root)?;
        let has_tilted = parts.features.iter().any(|f| f.tilted);
        Ok(Self {
            window: parts.window,
            stages: parts.stages,
            features: parts.features,
            has_tilted,
        })
    }

    /// Base detection window `(width, height)`.
    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Detect objects of every size in `image`.
    pub fn detect_multi_scale(&self, image: &GrayImage, params: &ScanParams) -> Vec<Detection> {
        let hits = self.scan(image, params);
        group_rectangles(hits, params.min_neighbors, GROUP_EPS)
    }
}
