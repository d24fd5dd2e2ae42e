pub mod cascade;
pub mod fixed;
#[cfg(feature = "opencv")]
pub mod opencv_cascade;

pub use cascade::CascadeClassifier;
pub use fixed::FixedClassifier;
#[cfg(feature = "opencv")]
pub use opencv_cascade::OpencvCascadeClassifier;
