use crate::error::{MatchError, MatchResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default ambiguity ratio for the nearest/second-nearest test.
pub const DEFAULT_RATIO: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Accept the nearest neighbor only if `d1 < ratio * d2`
    pub ratio: f64,
    /// Keep only mutual nearest neighbors
    pub cross_check: bool,
    /// Search queries on the rayon pool
    pub parallel: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            cross_check: false,
            parallel: true,
        }
    }
}

impl MatcherConfig {
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn validate(&self) -> MatchResult<()> {
        // written so that NaN fails too
        if !(self.ratio > 0.0 && self.ratio < 1.0) {
            return Err(MatchError::InvalidRatio(self.ratio));
        }
        Ok(())
    }
}
