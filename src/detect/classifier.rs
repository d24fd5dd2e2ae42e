use crate::detect::result::Detection;
use crate::frame::GrayFrame;

/// A pre-loaded object classifier.
///
/// Constructed once, then treated as a pure function from a grayscale frame to a set
/// of rectangles. `detect` takes `&self`: a classifier is never mutated by the loop and
/// may be reused for any number of frames.
pub trait Classifier {
    /// Classifier identifier (for logs).
    fn name(&self) -> &str;

    /// Scan `frame` and return every detected rectangle, in frame coordinates.
    fn detect(&self, frame: &GrayFrame) -> Vec<Detection>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&self, frame: &GrayFrame) -> Vec<Detection> {
        (**self).detect(frame)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&self, frame: &GrayFrame) -> Vec<Detection> {
        (**self).detect(frame)
    }
}
