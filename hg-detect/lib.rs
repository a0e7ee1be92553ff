//! Reference feature extractor: FAST-12 corners on a factor-2 pyramid, each
//! described by a rotated 8x8 intensity patch (64 floats, zero mean, unit norm).

pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod fast;
pub mod pyramid;

pub use config::DetectorConfig;
pub use descriptor::DESCRIPTOR_DIM;
pub use error::{DetectError, DetectResult};
pub use extractor::FastPatchExtractor;
