use crate::error::{HomographyError, HomographyResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimal sample size of a homography.
pub const SAMPLE_SIZE: usize = 4;

/// RANSAC settings for homography fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Upper bound on the number of trials
    pub max_iters: usize,
    /// Inlier threshold on reprojection error, in scene pixels
    pub inlier_threshold: f64,
    /// Minimum inliers for the final model
    pub min_inliers: usize,
    /// Minimum inliers as a fraction of all correspondences
    pub min_inlier_fraction: f64,
    /// Target probability of having drawn one all-inlier sample
    pub confidence: f64,
    /// Seed for reproducible runs; entropy when unset
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
    /// Trials evaluated between early-stop checks
    pub batch_size: usize,
    /// Redraws allowed per trial when a sample is degenerate
    pub degenerate_retries: usize,
    /// Evaluate trials on the rayon pool
    pub parallel: bool,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 3.0,
            min_inliers: SAMPLE_SIZE,
            min_inlier_fraction: 0.0,
            confidence: 0.995,
            seed: None,
            batch_size: 64,
            degenerate_retries: 32,
            parallel: true,
        }
    }
}

impl RansacConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_inlier_threshold(mut self, threshold: f64) -> Self {
        self.inlier_threshold = threshold;
        self
    }

    /// Inliers the final model must reach for `n` correspondences.
    pub fn required_inliers(&self, n: usize) -> usize {
        let by_fraction = (self.min_inlier_fraction * n as f64).ceil() as usize;
        self.min_inliers.max(by_fraction)
    }

    pub fn validate(&self) -> HomographyResult<()> {
        if self.max_iters == 0 {
            return Err(HomographyError::InvalidConfig("max_iters must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(HomographyError::InvalidConfig("batch_size must be > 0".into()));
        }
        if !(self.inlier_threshold > 0.0 && self.inlier_threshold.is_finite()) {
            return Err(HomographyError::InvalidConfig(format!(
                "inlier_threshold {} must be positive",
                self.inlier_threshold
            )));
        }
        if self.min_inliers < SAMPLE_SIZE {
            return Err(HomographyError::InvalidConfig(format!(
                "min_inliers {} is below the sample size {}",
                self.min_inliers, SAMPLE_SIZE
            )));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_fraction) {
            return Err(HomographyError::InvalidConfig(format!(
                "min_inlier_fraction {} outside [0, 1]",
                self.min_inlier_fraction
            )));
        }
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            return Err(HomographyError::InvalidConfig(format!(
                "confidence {} outside (0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}
