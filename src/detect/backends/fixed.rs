use std::collections::HashMap;

use crate::detect::classifier::Classifier;
use crate::detect::result::Detection;
use crate::frame::GrayFrame;

/// Deterministic classifier for tests and synthetic runs.
///
/// Returns a per-frame-index rectangle set when one is scheduled, otherwise the
/// default set. Pixels are ignored.
#[derive(Clone, Debug, Default)]
pub struct FixedClassifier {
    default: Vec<Detection>,
    schedule: HashMap<u64, Vec<Detection>>,
}

impl FixedClassifier {
    /// Classifier that reports nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classifier that reports `detections` for every frame.
    pub fn always(detections: Vec<Detection>) -> Self {
        Self {
            default: detections,
            schedule: HashMap::new(),
        }
    }

    /// Report `detections` for the frame at `index` instead of the default set.
    pub fn with_frame(mut self, index: u64, detections: Vec<Detection>) -> Self {
        self.schedule.insert(index, detections);
        self
    }
}

impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, frame: &GrayFrame) -> Vec<Detection> {
        self.schedule
            .get(&frame.index)
            .unwrap_or(&self.default)
            .clone()
    }
}
