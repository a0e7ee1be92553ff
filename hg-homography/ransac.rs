use hg_core::{Correspondence, KeypointSet};
use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::config::{RansacConfig, SAMPLE_SIZE};
use crate::error::{HomographyError, HomographyResult};
use crate::homography::Homography;
use crate::solve::{fit_dlt, normalizing_transform, quad_is_degenerate, solve_four_point};

/// Rounds of inlier refitting after consensus.
const REFIT_ROUNDS: usize = 3;

/// Robust fit over point pairs.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// Indices of the inlier pairs, ascending
    pub inliers: Vec<usize>,
    /// Mean reprojection error over the inliers, in pixels
    pub mean_error: f64,
    /// Trials actually evaluated
    pub trials: usize,
}

impl HomographyEstimate {
    pub fn inlier_count(&self) -> usize {
        self.inliers.len()
    }
}

/// Robust fit over descriptor correspondences.
#[derive(Debug, Clone)]
pub struct CorrespondenceFit {
    pub estimate: HomographyEstimate,
    /// Inlier subset of the input correspondences, input order
    pub inliers: Vec<Correspondence>,
}

impl CorrespondenceFit {
    pub fn homography(&self) -> &Homography {
        &self.estimate.homography
    }

    pub fn inlier_count(&self) -> usize {
        self.inliers.len()
    }
}

/// Scored model. Ordering: more inliers, then lower mean error, then earlier trial.
#[derive(Debug, Clone)]
struct Candidate {
    h: Homography,
    inliers: usize,
    mean_error: f64,
    trial: usize,
}

fn better(a: Candidate, b: Candidate) -> Candidate {
    use std::cmp::Ordering;
    let ord = b
        .inliers
        .cmp(&a.inliers)
        .then_with(|| a.mean_error.total_cmp(&b.mean_error))
        .then_with(|| a.trial.cmp(&b.trial));
    match ord {
        Ordering::Greater => b,
        _ => a,
    }
}

fn better_opt(a: Option<Candidate>, b: Option<Candidate>) -> Option<Candidate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(better(a, b)),
        (a, b) => a.or(b),
    }
}

/// Normalizing similarities of the full point sets. Models are tested for
/// singularity in this frame, so the verdict does not depend on where the
/// object sits in the scene.
struct Frame {
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
}

impl Frame {
    fn new(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Self {
        Self {
            t_src: normalizing_transform(src).unwrap_or_else(Matrix3::identity),
            t_dst: normalizing_transform(dst).unwrap_or_else(Matrix3::identity),
        }
    }

    fn is_singular(&self, h: &Homography) -> bool {
        h.conditioned(&self.t_src, &self.t_dst)
            .map_or(true, |c| c.is_singular())
    }

    fn condition_ratio(&self, h: &Homography) -> f64 {
        h.conditioned(&self.t_src, &self.t_dst)
            .map_or(0.0, |c| c.condition_ratio())
    }
}

/// Trials needed to draw one all-inlier sample with probability `confidence`
/// at inlier ratio `w`.
pub fn adaptive_trials(inliers: usize, total: usize, confidence: f64, max_iters: usize) -> usize {
    if total == 0 || inliers == 0 {
        return max_iters;
    }
    let w = inliers as f64 / total as f64;
    let p_good = w.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    if confidence >= 1.0 || p_good <= f64::EPSILON {
        return max_iters;
    }
    let n = ((1.0 - confidence).ln() / (1.0 - p_good).ln()).ceil();
    if n.is_finite() && n >= 1.0 {
        (n as usize).min(max_iters)
    } else {
        max_iters
    }
}

/// Seeded RANSAC homography estimator.
///
/// Each trial owns an RNG seeded from a master stream, trials run in fixed-size
/// batches, and batch winners are combined with a total order, so the result
/// for a given seed does not depend on how many threads ran it.
#[derive(Debug, Clone)]
pub struct HomographyEstimator {
    cfg: RansacConfig,
}

impl HomographyEstimator {
    pub fn new(cfg: RansacConfig) -> HomographyResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &RansacConfig {
        &self.cfg
    }

    /// Fit `dst ≈ H(src)` robustly.
    pub fn estimate(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> HomographyResult<HomographyEstimate> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < SAMPLE_SIZE {
            return Err(HomographyError::InsufficientData {
                needed: SAMPLE_SIZE,
                got: n,
            });
        }

        let frame = Frame::new(src, dst);
        let mut master = match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best: Option<Candidate> = None;
        let mut trials = 0usize;
        let mut limit = self.cfg.max_iters;

        while trials < limit {
            let batch = self.cfg.batch_size.min(limit - trials);
            let seeds: Vec<u64> = (0..batch).map(|_| master.r#gen()).collect();
            let first = trials;

            let run = |(k, seed): (usize, u64)| self.run_trial(first + k, seed, src, dst, &frame);
            let batch_best = if self.cfg.parallel {
                seeds.into_par_iter().enumerate().filter_map(run).reduce_with(better)
            } else {
                seeds.into_iter().enumerate().filter_map(run).reduce(better)
            };

            best = better_opt(best, batch_best);
            trials += batch;
            if let Some(b) = &best {
                limit = adaptive_trials(b.inliers, n, self.cfg.confidence, self.cfg.max_iters);
            }
        }

        let best = best.ok_or(HomographyError::NoConsensus { trials })?;
        log::debug!(
            "ransac: best sample from trial {} with {}/{} inliers after {} trials",
            best.trial,
            best.inliers,
            n,
            trials
        );

        let (homography, inliers, mean_error) = self.refine(best, src, dst, &frame);

        let needed = self.cfg.required_inliers(n);
        if inliers.len() < needed {
            return Err(HomographyError::InsufficientInliers {
                needed,
                found: inliers.len(),
            });
        }
        if frame.is_singular(&homography) {
            return Err(HomographyError::Singular {
                condition: frame.condition_ratio(&homography),
                inliers: inliers.len(),
            });
        }

        log::debug!(
            "ransac: final model {} inliers, mean error {:.4} px",
            inliers.len(),
            mean_error
        );
        Ok(HomographyEstimate {
            homography: homography.with_unit_h33(),
            inliers,
            mean_error,
            trials,
        })
    }

    /// Fit over correspondences between `object` and `scene` keypoints.
    pub fn estimate_matches(
        &self,
        matches: &[Correspondence],
        object: &KeypointSet,
        scene: &KeypointSet,
    ) -> HomographyResult<CorrespondenceFit> {
        let mut src = Vec::with_capacity(matches.len());
        let mut dst = Vec::with_capacity(matches.len());
        for m in matches {
            src.push(object.keypoint(m.object_index)?.pt());
            dst.push(scene.keypoint(m.scene_index)?.pt());
        }
        let estimate = self.estimate(&src, &dst)?;
        let inliers = estimate.inliers.iter().map(|&i| matches[i]).collect();
        Ok(CorrespondenceFit { estimate, inliers })
    }

    fn run_trial(
        &self,
        trial: usize,
        seed: u64,
        src: &[[f64; 2]],
        dst: &[[f64; 2]],
        frame: &Frame,
    ) -> Option<Candidate> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let n = src.len();

        for _ in 0..=self.cfg.degenerate_retries {
            let picks = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE);
            let mut s4 = [[0.0; 2]; SAMPLE_SIZE];
            let mut d4 = [[0.0; 2]; SAMPLE_SIZE];
            for (slot, idx) in picks.iter().enumerate() {
                s4[slot] = src[idx];
                d4[slot] = dst[idx];
            }
            if quad_is_degenerate(&s4) || quad_is_degenerate(&d4) {
                continue;
            }

            let h = Homography::from_matrix(solve_four_point(&s4, &d4)?);
            if frame.is_singular(&h) {
                return None;
            }
            let (inliers, mean_error) = self.score(&h, src, dst);
            return Some(Candidate {
                h,
                inliers,
                mean_error,
                trial,
            });
        }
        None
    }

    fn score(&self, h: &Homography, src: &[[f64; 2]], dst: &[[f64; 2]]) -> (usize, f64) {
        let mut count = 0usize;
        let mut sum = 0.0;
        for (s, d) in src.iter().zip(dst) {
            let err = h.reprojection_error(*s, *d);
            if err <= self.cfg.inlier_threshold {
                count += 1;
                sum += err;
            }
        }
        let mean = if count > 0 { sum / count as f64 } else { f64::INFINITY };
        (count, mean)
    }

    fn inlier_set(&self, h: &Homography, src: &[[f64; 2]], dst: &[[f64; 2]]) -> (Vec<usize>, f64) {
        let mut idx = Vec::new();
        let mut sum = 0.0;
        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            let err = h.reprojection_error(*s, *d);
            if err <= self.cfg.inlier_threshold {
                idx.push(i);
                sum += err;
            }
        }
        let mean = if idx.is_empty() { f64::INFINITY } else { sum / idx.len() as f64 };
        (idx, mean)
    }

    /// Least-squares refit on the consensus set, repeated while it does not
    /// lose inliers. Falls back to the minimal-sample model otherwise.
    fn refine(
        &self,
        best: Candidate,
        src: &[[f64; 2]],
        dst: &[[f64; 2]],
        frame: &Frame,
    ) -> (Homography, Vec<usize>, f64) {
        let (mut inliers, mut mean_error) = self.inlier_set(&best.h, src, dst);
        let mut h = best.h;

        for _ in 0..REFIT_ROUNDS {
            let in_src: Vec<[f64; 2]> = inliers.iter().map(|&i| src[i]).collect();
            let in_dst: Vec<[f64; 2]> = inliers.iter().map(|&i| dst[i]).collect();
            let Some(refit) = fit_dlt(&in_src, &in_dst).map(Homography::from_matrix) else {
                break;
            };
            if frame.is_singular(&refit) {
                break;
            }
            let (next, next_mean) = self.inlier_set(&refit, src, dst);
            let improved = next.len() > inliers.len()
                || (next.len() == inliers.len() && next_mean <= mean_error);
            if !improved {
                break;
            }
            let converged = next == inliers;
            h = refit;
            inliers = next;
            mean_error = next_mean;
            if converged {
                break;
            }
        }
        (h, inliers, mean_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::Keypoint;
    use proptest::prelude::*;
    use rand::Rng;

    fn truth() -> Homography {
        Homography::from_rows([
            [1.1, 0.08, 120.0],
            [-0.06, 0.95, 60.0],
            [0.0002, -0.0001, 1.0],
        ])
    }

    fn clean_pairs(h: &Homography, n: usize, seed: u64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let src: Vec<[f64; 2]> = (0..n)
            .map(|_| [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)])
            .collect();
        let dst = src.iter().map(|s| h.project(*s).unwrap()).collect();
        (src, dst)
    }

    fn seeded(seed: u64) -> HomographyEstimator {
        HomographyEstimator::new(RansacConfig::default().with_seed(seed).with_max_iters(1000)).unwrap()
    }

    #[test]
    fn test_recovers_clean_homography() {
        let h = truth();
        let (src, dst) = clean_pairs(&h, 30, 1);
        let est = seeded(42).estimate(&src, &dst).unwrap();
        assert_eq!(est.inlier_count(), 30);
        assert!(est.homography.relative_difference(&h) < 1e-3);
        assert!(est.mean_error < 1e-6);
    }

    #[test]
    fn test_exactly_four_clean_points() {
        let h = truth();
        let src = vec![[0.0, 0.0], [200.0, 10.0], [190.0, 180.0], [5.0, 170.0]];
        let dst: Vec<[f64; 2]> = src.iter().map(|s| h.project(*s).unwrap()).collect();
        let est = seeded(7).estimate(&src, &dst).unwrap();
        assert_eq!(est.inliers, vec![0, 1, 2, 3]);
        assert!(est.homography.relative_difference(&h) < 1e-3);
    }

    #[test]
    fn test_robust_to_forty_percent_outliers() {
        let h = truth();
        let mut recovered = 0;
        for seed in 0..10u64 {
            let (mut src, mut dst) = clean_pairs(&h, 60, 100 + seed);
            let mut rng = StdRng::seed_from_u64(900 + seed);
            // replace 40% of the pairs with random ones
            for i in 0..24 {
                src[i] = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
                dst[i] = [rng.gen_range(0.0..1200.0), rng.gen_range(0.0..900.0)];
            }
            let est = seeded(seed).estimate(&src, &dst).unwrap();
            if est.homography.relative_difference(&h) < 1e-3 && est.inlier_count() >= 36 {
                recovered += 1;
            }
        }
        assert!(recovered >= 9, "recovered {} of 10", recovered);
    }

    #[test]
    fn test_same_seed_same_result() {
        let h = truth();
        let (mut src, mut dst) = clean_pairs(&h, 40, 5);
        let mut rng = StdRng::seed_from_u64(6);
        for i in 0..15 {
            dst[i] = [rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)];
            src[i][0] += 1.0;
        }
        let a = seeded(42).estimate(&src, &dst).unwrap();
        let b = seeded(42).estimate(&src, &dst).unwrap();
        assert_eq!(a.homography, b.homography);
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.trials, b.trials);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let h = truth();
        let (mut src, mut dst) = clean_pairs(&h, 50, 8);
        let mut rng = StdRng::seed_from_u64(9);
        for i in 0..20 {
            dst[i] = [rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)];
        }
        let serial = HomographyEstimator::new(RansacConfig {
            parallel: false,
            ..RansacConfig::default().with_seed(3)
        })
        .unwrap()
        .estimate(&src, &dst)
        .unwrap();

        for threads in [1, 4] {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            let parallel = pool.install(|| {
                HomographyEstimator::new(RansacConfig::default().with_seed(3))
                    .unwrap()
                    .estimate(&src, &dst)
                    .unwrap()
            });
            assert_eq!(parallel.homography, serial.homography);
            assert_eq!(parallel.inliers, serial.inliers);
        }
    }

    #[test]
    fn test_too_few_correspondences() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let err = seeded(1).estimate(&pts, &pts).unwrap_err();
        assert!(matches!(err, HomographyError::InsufficientData { needed: 4, got: 3 }));
        assert!(err.is_insufficient_data());
        assert!(!err.is_degenerate());
    }

    #[test]
    fn test_collinear_sample_never_wins() {
        let src = vec![[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [30.0, 30.0]];
        let dst = vec![[5.0, 1.0], [40.0, 3.0], [12.0, 90.0], [70.0, 60.0]];
        let err = seeded(2).estimate(&src, &dst).unwrap_err();
        assert!(matches!(err, HomographyError::NoConsensus { .. }));
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_collinear_scene_points_rejected() {
        let src = vec![[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]];
        let dst = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 9.0]];
        assert!(matches!(
            seeded(2).estimate(&src, &dst),
            Err(HomographyError::NoConsensus { .. })
        ));
    }

    #[test]
    fn test_inlier_fraction_requirement() {
        let h = truth();
        let (mut src, mut dst) = clean_pairs(&h, 20, 12);
        let mut rng = StdRng::seed_from_u64(13);
        for i in 0..12 {
            src[i] = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
            dst[i] = [rng.gen_range(0.0..1200.0), rng.gen_range(0.0..900.0)];
        }
        let cfg = RansacConfig {
            min_inlier_fraction: 0.75,
            ..RansacConfig::default().with_seed(4)
        };
        let err = HomographyEstimator::new(cfg).unwrap().estimate(&src, &dst).unwrap_err();
        assert!(matches!(err, HomographyError::InsufficientInliers { needed: 15, .. }));
        assert_eq!(err.inlier_count(), Some(8));
    }

    #[test]
    fn test_estimate_matches_maps_inliers_back() {
        let h = truth();
        let object_pts = [[10.0, 10.0], [300.0, 20.0], [280.0, 200.0], [20.0, 220.0], [150.0, 110.0]];
        let object = KeypointSet::new(
            object_pts.iter().map(|p| Keypoint::at(p[0] as f32, p[1] as f32)).collect(),
            vec![vec![0.0]; 5],
        )
        .unwrap();
        let mut scene_kps: Vec<Keypoint> = object_pts
            .iter()
            .map(|p| {
                let q = h.project(*p).unwrap();
                Keypoint::at(q[0] as f32, q[1] as f32)
            })
            .collect();
        scene_kps.push(Keypoint::at(900.0, 5.0));
        let scene = KeypointSet::new(scene_kps, vec![vec![0.0]; 6]).unwrap();

        let mut matches: Vec<Correspondence> = (0..5).map(|i| Correspondence::new(i, i, 0.1)).collect();
        matches.push(Correspondence::new(4, 5, 0.2));

        let fit = seeded(11).estimate_matches(&matches, &object, &scene).unwrap();
        assert_eq!(fit.inlier_count(), 5);
        assert!(fit.inliers.iter().all(|c| c.object_index == c.scene_index));
        // f32 keypoint storage limits precision
        assert!(fit.homography().relative_difference(&h) < 1e-3);

        let bad = [Correspondence::new(9, 0, 0.0)];
        assert!(matches!(
            seeded(11).estimate_matches(&bad, &object, &scene),
            Err(HomographyError::Core(_))
        ));
    }

    #[test]
    fn test_adaptive_trials() {
        assert_eq!(adaptive_trials(10, 10, 0.99, 500), 1);
        assert_eq!(adaptive_trials(0, 10, 0.99, 500), 500);
        // w = 0.5: ln(0.01) / ln(1 - 1/16) = 71.4
        assert_eq!(adaptive_trials(50, 100, 0.99, 500), 72);
        assert_eq!(adaptive_trials(1, 1000, 0.99, 500), 500);
    }

    #[test]
    fn test_small_object_far_from_scene_origin() {
        let h = Homography::from_rows([[0.25, 0.0, 4000.0], [0.0, 0.25, 4000.0], [0.0, 0.0, 1.0]]);
        let src: Vec<[f64; 2]> = (0..5)
            .flat_map(|i| (0..5).map(move |j| [i as f64 * 150.0, j as f64 * 110.0]))
            .collect();
        let dst: Vec<[f64; 2]> = src.iter().map(|s| h.project(*s).unwrap()).collect();

        let est = seeded(42).estimate(&src, &dst).unwrap();
        assert_eq!(est.inlier_count(), 25);
        assert!(est.homography.relative_difference(&h) < 1e-3);
        assert!(est.mean_error < 1e-6);
    }

    #[test]
    fn test_large_scene_with_outliers() {
        let h = Homography::from_rows([
            [0.3, 0.02, 12_000.0],
            [-0.01, 0.28, 9_000.0],
            [2e-6, -1e-6, 1.0],
        ]);
        let (src, mut dst) = clean_pairs(&h, 60, 21);
        let mut rng = StdRng::seed_from_u64(22);
        for i in 0..20 {
            dst[i] = [rng.gen_range(0.0..20_000.0), rng.gen_range(0.0..15_000.0)];
        }

        let est = seeded(5).estimate(&src, &dst).unwrap();
        assert!(est.inlier_count() >= 40, "{} inliers", est.inlier_count());
        assert!((20..60).all(|i| est.inliers.contains(&i)));
        let corner = est.homography.project([640.0, 480.0]).unwrap();
        let expected = h.project([640.0, 480.0]).unwrap();
        assert!((corner[0] - expected[0]).abs() < 0.01 && (corner[1] - expected[1]).abs() < 0.01);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_clean_similarity_recovered_anywhere(
            scale in 0.05f64..4.0,
            theta in -3.1f64..3.1,
            tx in -100_000.0f64..100_000.0,
            ty in -100_000.0f64..100_000.0,
            g in -1e-4f64..1e-4,
            k in -1e-4f64..1e-4,
            seed in any::<u64>(),
        ) {
            let (c, s) = (scale * theta.cos(), scale * theta.sin());
            let h = Homography::from_rows([[c, -s, tx], [s, c, ty], [g, k, 1.0]]);
            let (src, dst) = clean_pairs(&h, 20, seed);

            let est = seeded(seed).estimate(&src, &dst);
            prop_assert!(est.is_ok(), "{:?}", est.err());
            let est = est.unwrap();
            prop_assert_eq!(est.inlier_count(), 20);
            for (p, q) in src.iter().zip(&dst) {
                prop_assert!(est.homography.reprojection_error(*p, *q) < 1e-4);
            }
        }
    }
}
