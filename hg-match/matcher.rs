use hg_core::{Correspondence, KeypointSet};
use rayon::prelude::*;

use crate::config::MatcherConfig;
use crate::error::{MatchError, MatchResult};

/// The two nearest scene descriptors of one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoNearest {
    pub best_index: usize,
    pub best_distance: f64,
    pub second_index: usize,
    pub second_distance: f64,
}

impl TwoNearest {
    /// Strict ratio test: equality is ambiguous and rejected.
    #[inline]
    pub fn passes_ratio(&self, ratio: f64) -> bool {
        self.best_distance < ratio * self.second_distance
    }
}

/// Euclidean distance between two descriptors, accumulated in f64.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Exhaustive top-2 search. Equal distances resolve to the lower index, so the
/// result is reproducible. Returns `None` when `candidates` has fewer than two rows.
pub fn two_nearest<'a, I>(query: &[f32], candidates: I) -> Option<TwoNearest>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut best = (f64::INFINITY, usize::MAX);
    let mut second = (f64::INFINITY, usize::MAX);
    let mut seen = 0usize;

    for (j, row) in candidates.into_iter().enumerate() {
        let d = l2_distance(query, row);
        if d < best.0 {
            second = best;
            best = (d, j);
        } else if d < second.0 {
            second = (d, j);
        }
        seen += 1;
    }

    if seen < 2 || best.1 == usize::MAX || second.1 == usize::MAX {
        return None;
    }
    Some(TwoNearest {
        best_index: best.1,
        best_distance: best.0,
        second_index: second.1,
        second_distance: second.0,
    })
}

/// Brute-force L2 matcher with the nearest/second-nearest ratio test.
#[derive(Debug, Clone)]
pub struct DescriptorMatcher {
    cfg: MatcherConfig,
}

impl DescriptorMatcher {
    pub fn new(cfg: MatcherConfig) -> MatchResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Matcher with default settings and the given ratio.
    pub fn with_ratio(ratio: f64) -> MatchResult<Self> {
        Self::new(MatcherConfig::default().with_ratio(ratio))
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    /// Match every object descriptor against the scene.
    ///
    /// Output is ordered by ascending object index and is identical between
    /// the serial and parallel paths. A scene with fewer than two entries
    /// yields no correspondences.
    pub fn match_sets(&self, object: &KeypointSet, scene: &KeypointSet) -> MatchResult<Vec<Correspondence>> {
        if object.is_empty() || scene.len() < 2 {
            log::debug!(
                "matcher: nothing to match ({} object, {} scene entries)",
                object.len(),
                scene.len()
            );
            return Ok(Vec::new());
        }
        if object.dimension() != scene.dimension() {
            return Err(MatchError::DimensionMismatch {
                object: object.dimension(),
                scene: scene.dimension(),
            });
        }

        let ratio = self.cfg.ratio;
        let query = |(i, desc): (usize, &[f32])| {
            two_nearest(desc, scene.descriptors())
                .filter(|nn| nn.passes_ratio(ratio))
                .map(|nn| Correspondence::new(i, nn.best_index, nn.best_distance as f32))
        };

        let candidates: Vec<Option<Correspondence>> = if self.cfg.parallel {
            let rows: Vec<&[f32]> = object.descriptors().collect();
            rows.into_par_iter().enumerate().map(query).collect()
        } else {
            object.descriptors().enumerate().map(query).collect()
        };

        let mut matches: Vec<Correspondence> = candidates.into_iter().flatten().collect();
        let accepted = matches.len();

        if self.cfg.cross_check {
            matches.retain(|m| nearest_index(scene_row(scene, m.scene_index), object) == Some(m.object_index));
        }

        log::debug!(
            "matcher: {} queries, {} passed ratio {:.3}, {} kept",
            object.len(),
            accepted,
            ratio,
            matches.len()
        );
        Ok(matches)
    }
}

fn scene_row(scene: &KeypointSet, index: usize) -> &[f32] {
    let dim = scene.dimension();
    &scene.descriptor_values()[index * dim..(index + 1) * dim]
}

/// Index of the nearest row, lowest index on ties.
fn nearest_index(query: &[f32], set: &KeypointSet) -> Option<usize> {
    let mut best = (f64::INFINITY, None);
    for (j, row) in set.descriptors().enumerate() {
        let d = l2_distance(query, row);
        if d < best.0 {
            best = (d, Some(j));
        }
    }
    best.1
}
