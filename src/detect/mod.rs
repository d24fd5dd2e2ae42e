mod backends;
mod classifier;
mod profile;
mod result;

pub use backends::{CascadeClassifier, FixedClassifier};
#[cfg(feature = "opencv")]
pub use backends::OpencvCascadeClassifier;
pub use classifier::Classifier;
pub use profile::Profile;
pub use result::Detection;
