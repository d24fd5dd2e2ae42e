use std::path::Path;

use anyhow::Result;

use crate::cascade::{HaarCascade, ScanParams};
use crate::detect::classifier::Classifier;
use crate::detect::result::Detection;
use crate::frame::GrayFrame;

/// Haar cascade bound to fixed scan parameters.
#[derive(Clone, Debug)]
pub struct CascadeClassifier {
    name: String,
    cascade: HaarCascade,
    params: ScanParams,
}

impl CascadeClassifier {
    pub fn new(cascade: HaarCascade, params: ScanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: "haar-cascade".to_string(),
            cascade,
            params,
        })
    }

    /// Load the cascade at `path`. The file stem becomes the classifier name.
    pub fn load(path: impl AsRef<Path>, params: ScanParams) -> Result<Self> {
        let path = path.as_ref();
        let cascade = HaarCascade::load(path)?;
        let mut classifier = Self::new(cascade, params)?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            classifier.name = stem.to_string();
        }
        log::info!(
            "loaded cascade {} ({}x{} window, {} stages, {} features)",
            path.display(),
            classifier.cascade.window_size().0,
            classifier.cascade.window_size().1,
            classifier.cascade.stage_count(),
            classifier.cascade.feature_count()
        );
        Ok(classifier)
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }
}

impl Classifier for CascadeClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, frame: &GrayFrame) -> Vec<Detection> {
        self.cascade.detect_multi_scale(frame.image(), &self.params)
    }
}
