use std::path::Path;

use hg_homography::Homography;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Outcome of one `process` run.
///
/// Timings and counts are filled in as stages complete, so a failed run still
/// reports how far it got. `vertices` is set only when the object was located.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Object corners in scene coordinates: top-left, top-right, bottom-right, bottom-left
    pub vertices: Option<[[f64; 2]; 4]>,
    /// Feature extraction time, seconds
    pub ftime: f64,
    /// Matching time, seconds
    pub mtime: f64,
    /// Homography estimation time, seconds
    pub htime: f64,
    #[serde(rename = "matches")]
    pub match_count: usize,
    #[serde(rename = "inliers")]
    pub inlier_count: usize,
    pub homography: Option<Homography>,
    pub error: Option<String>,
}

impl MatchReport {
    pub fn is_located(&self) -> bool {
        self.vertices.is_some()
    }

    pub fn total_time(&self) -> f64 {
        self.ftime + self.mtime + self.htime
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let json = self.to_json().map_err(std::io::Error::from)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}
