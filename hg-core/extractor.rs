use crate::image::LumaImage;
use crate::types::{Descriptor, Keypoint};

/// Error type returned by feature extraction backends.
pub type ExtractError = Box<dyn std::error::Error + Send + Sync>;

/// Capability interface for a keypoint detector + descriptor extractor.
///
/// Implementations must return exactly one descriptor per keypoint, all of
/// the same length, in a deterministic order for a given image and threshold.
pub trait FeatureExtractor: Send + Sync {
    /// Detect keypoints whose response exceeds `threshold` and describe them.
    fn detect(&self, image: &LumaImage, threshold: f32) -> Result<(Vec<Keypoint>, Vec<Descriptor>), ExtractError>;

    /// Descriptor length this backend produces.
    fn descriptor_dimension(&self) -> usize;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "extractor"
    }
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for Box<T> {
    fn detect(&self, image: &LumaImage, threshold: f32) -> Result<(Vec<Keypoint>, Vec<Descriptor>), ExtractError> {
        (**self).detect(image, threshold)
    }

    fn descriptor_dimension(&self) -> usize {
        (**self).descriptor_dimension()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
