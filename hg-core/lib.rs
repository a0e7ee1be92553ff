//! Core types shared by the matching, estimation and pipeline crates.

pub mod error;
pub mod extractor;
pub mod image;
#[cfg(feature = "serde")]
pub mod io;
pub mod keypoint_set;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use extractor::{ExtractError, FeatureExtractor};
pub use image::LumaImage;
pub use keypoint_set::KeypointSet;
pub use types::{Correspondence, Descriptor, Keypoint};
