//! Planar object localization: match an object image against precomputed scene
//! keypoints, fit a homography and report where the object's corners land.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod report;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineFailure, PipelineResult};
pub use pipeline::{decode_luma, MatchPipeline, PipelineState};
pub use report::MatchReport;

pub use hg_core;
pub use hg_detect;
pub use hg_homography;
pub use hg_match;
