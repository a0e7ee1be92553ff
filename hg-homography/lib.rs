//! Planar homography estimation.
//!
//! [`HomographyEstimator`] runs a seeded, batch-parallel RANSAC over minimal
//! four-point samples and refits the consensus set with a normalized DLT.

pub mod config;
pub mod error;
pub mod homography;
pub mod ransac;
pub mod solve;

pub use config::{RansacConfig, SAMPLE_SIZE};
pub use error::{HomographyError, HomographyResult};
pub use homography::{image_corners, project_quad, Homography};
pub use ransac::{adaptive_trials, CorrespondenceFit, HomographyEstimate, HomographyEstimator};
