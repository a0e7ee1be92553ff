use hg_core::{Descriptor, ExtractError, FeatureExtractor, Keypoint, LumaImage};
use rayon::prelude::*;

use crate::config::{validate_threshold, DetectorConfig};
use crate::descriptor::{describe, DESCRIPTOR_DIM};
use crate::error::{DetectError, DetectResult};
use crate::fast::{detect_corners, intensity_centroid_angle, suppress};
use crate::pyramid::build_pyramid;

/// Multi-octave FAST corners described by oriented, normalized intensity patches.
#[derive(Debug, Clone)]
pub struct FastPatchExtractor {
    cfg: DetectorConfig,
}

impl FastPatchExtractor {
    pub fn new(cfg: DetectorConfig) -> DetectResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Detect with the configured threshold.
    pub fn detect_default(&self, image: &LumaImage) -> DetectResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        self.detect_with_threshold(image, self.cfg.threshold)
    }

    /// Keypoints in (octave, y, x) order with one descriptor each.
    pub fn detect_with_threshold(
        &self,
        image: &LumaImage,
        threshold: f32,
    ) -> DetectResult<(Vec<Keypoint>, Vec<Descriptor>)> {
        validate_threshold(threshold)?;
        let border = self.cfg.border();
        let min_size = 2 * border + 1;
        if image.width() < min_size || image.height() < min_size {
            return Err(DetectError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                min_size,
            });
        }

        let patch = self.cfg.patch_size;
        let mut found: Vec<(Keypoint, Descriptor)> = Vec::new();

        for octave in build_pyramid(image, self.cfg.n_octaves, min_size) {
            let corners = detect_corners(&octave.image, threshold, border);
            let raw = corners.len();
            let corners = suppress(corners, self.cfg.nms_distance);

            let described: Vec<(Keypoint, Descriptor)> = corners
                .par_iter()
                .map(|c| {
                    let angle = intensity_centroid_angle(&octave.image, c.x, c.y, patch / 2);
                    let desc = describe(&octave.image, c.x as f32, c.y as f32, angle, patch);
                    let (x, y) = octave.to_base(c.x as f32, c.y as f32);
                    let kp = Keypoint {
                        x,
                        y,
                        size: patch as f32 * octave.scale,
                        angle,
                        response: c.response,
                        octave: octave.level as i32,
                        class_id: -1,
                    };
                    (kp, desc)
                })
                .collect();

            log::debug!(
                "octave {} ({}x{}): {} corners, {} after suppression",
                octave.level,
                octave.image.width(),
                octave.image.height(),
                raw,
                described.len()
            );
            found.extend(described);
        }

        let found = keep_strongest(found, self.cfg.max_keypoints);
        Ok(found.into_iter().unzip())
    }
}

/// Keep the `max` highest-response entries without changing their relative order.
fn keep_strongest(found: Vec<(Keypoint, Descriptor)>, max: usize) -> Vec<(Keypoint, Descriptor)> {
    if found.len() <= max {
        return found;
    }
    let mut order: Vec<usize> = (0..found.len()).collect();
    order.sort_by(|&a, &b| found[b].0.response.total_cmp(&found[a].0.response).then(a.cmp(&b)));
    let mut keep = vec![false; found.len()];
    for &i in order.iter().take(max) {
        keep[i] = true;
    }
    found
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, k)| k.then_some(entry))
        .collect()
}

impl Default for FastPatchExtractor {
    fn default() -> Self {
        Self {
            cfg: DetectorConfig::default(),
        }
    }
}

impl FeatureExtractor for FastPatchExtractor {
    fn detect(&self, image: &LumaImage, threshold: f32) -> Result<(Vec<Keypoint>, Vec<Descriptor>), ExtractError> {
        Ok(self.detect_with_threshold(image, threshold)?)
    }

    fn descriptor_dimension(&self) -> usize {
        DESCRIPTOR_DIM
    }

    fn name(&self) -> &str {
        "fast-patch"
    }
}
