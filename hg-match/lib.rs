//! Descriptor matching between an object and a scene keypoint set.
//!
//! For each object descriptor the exact two nearest scene descriptors (L2) are
//! found and the nearest one is accepted when it is clearly better than the
//! runner-up (`d1 < ratio * d2`).

pub mod config;
pub mod error;
pub mod matcher;

pub use config::{MatcherConfig, DEFAULT_RATIO};
pub use error::{MatchError, MatchResult};
pub use matcher::{l2_distance, two_nearest, DescriptorMatcher, TwoNearest};
