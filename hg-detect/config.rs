use crate::error::{DetectError, DetectResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on pyramid depth.
pub const MAX_OCTAVES: usize = 8;

/// Settings of the FAST + patch-descriptor backend.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Segment-test intensity threshold, passed to `detect`
    pub threshold: f32,
    /// Side of the orientation / descriptor patch at octave 0 (odd)
    pub patch_size: usize,
    /// Pyramid levels, each half the size of the previous one
    pub n_octaves: usize,
    /// Strongest keypoints kept over all octaves
    pub max_keypoints: usize,
    /// Minimum distance between kept corners of one octave; 0 disables suppression
    pub nms_distance: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 20.0,
            patch_size: 31,
            n_octaves: 3,
            max_keypoints: 2000,
            nms_distance: 3.0,
        }
    }
}

impl DetectorConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Pixels skipped at every image border: the patch radius, and at least the FAST ring radius.
    pub fn border(&self) -> usize {
        (self.patch_size / 2).max(3)
    }

    pub fn validate(&self) -> DetectResult<()> {
        validate_threshold(self.threshold)?;
        if self.patch_size < 7 || self.patch_size % 2 == 0 {
            return Err(DetectError::InvalidPatchSize(self.patch_size));
        }
        if self.n_octaves == 0 || self.n_octaves > MAX_OCTAVES {
            return Err(DetectError::InvalidOctaveCount(self.n_octaves));
        }
        if self.max_keypoints == 0 {
            return Err(DetectError::ZeroKeypointBudget);
        }
        if !(self.nms_distance >= 0.0 && self.nms_distance.is_finite()) {
            return Err(DetectError::InvalidNmsDistance(self.nms_distance));
        }
        Ok(())
    }
}

pub(crate) fn validate_threshold(threshold: f32) -> DetectResult<()> {
    if threshold > 0.0 && threshold.is_finite() {
        Ok(())
    } else {
        Err(DetectError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = DetectorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.border(), 15);
    }

    #[test]
    fn test_rejects_bad_values() {
        let d = DetectorConfig::default;
        assert_eq!(d().with_threshold(0.0).validate(), Err(DetectError::InvalidThreshold(0.0)));
        assert!(d().with_threshold(f32::NAN).validate().is_err());
        assert_eq!(
            DetectorConfig { patch_size: 16, ..d() }.validate(),
            Err(DetectError::InvalidPatchSize(16))
        );
        assert_eq!(
            DetectorConfig { patch_size: 5, ..d() }.validate(),
            Err(DetectError::InvalidPatchSize(5))
        );
        assert_eq!(
            DetectorConfig { n_octaves: 0, ..d() }.validate(),
            Err(DetectError::InvalidOctaveCount(0))
        );
        assert_eq!(
            DetectorConfig { max_keypoints: 0, ..d() }.validate(),
            Err(DetectError::ZeroKeypointBudget)
        );
        assert!(DetectorConfig { nms_distance: -1.0, ..d() }.validate().is_err());
    }
}
