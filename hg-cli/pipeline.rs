use std::path::{Path, PathBuf};
use std::time::Instant;

use hg_core::{Correspondence, Descriptor, FeatureExtractor, Keypoint, KeypointSet, LumaImage};
use hg_detect::FastPatchExtractor;
use hg_homography::{image_corners, project_quad, HomographyEstimator};
use hg_match::DescriptorMatcher;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineFailure, PipelineResult};
use crate::render::{render_matches, MatchDrawing};
use crate::report::MatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    SceneLoaded,
    ObjectLoaded,
    FeaturesExtracted,
    Matched,
    HomographyEstimated,
    Done,
    Error,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Locates an object image inside a scene whose keypoints were computed ahead of time.
///
/// Lifecycle: `load_scene*` once, then `load_object_image` (or `set_object_image`),
/// then `process`. A failed step moves the pipeline to [`PipelineState::Error`],
/// which only [`MatchPipeline::reset`] leaves. Calling an operation in the wrong
/// state is rejected without changing the state.
pub struct MatchPipeline<E: FeatureExtractor = FastPatchExtractor> {
    cfg: PipelineConfig,
    extractor: E,
    pool: rayon::ThreadPool,
    state: PipelineState,
    scene: Option<KeypointSet>,
    scene_image: Option<LumaImage>,
    object_image: Option<LumaImage>,
    object: Option<KeypointSet>,
    matches: Vec<Correspondence>,
    inliers: Vec<Correspondence>,
    report: Option<MatchReport>,
}

impl MatchPipeline<FastPatchExtractor> {
    /// Pipeline backed by the built-in FAST + patch descriptor extractor.
    pub fn new(cfg: PipelineConfig) -> PipelineResult<Self> {
        let extractor =
            FastPatchExtractor::new(cfg.detector.clone()).map_err(|e| PipelineError::Config(e.to_string()))?;
        Self::with_extractor(cfg, extractor)
    }
}

impl<E: FeatureExtractor> MatchPipeline<E> {
    pub fn with_extractor(cfg: PipelineConfig, extractor: E) -> PipelineResult<Self> {
        cfg.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.n_threads)
            .thread_name(|i| format!("hg-worker-{}", i))
            .build()?;
        log::debug!("pipeline created with {} ({})", extractor.name(), cfg.summary());
        Ok(Self {
            cfg,
            extractor,
            pool,
            state: PipelineState::Idle,
            scene: None,
            scene_image: None,
            object_image: None,
            object: None,
            matches: Vec::new(),
            inliers: Vec::new(),
            report: None,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn scene(&self) -> Option<&KeypointSet> {
        self.scene.as_ref()
    }

    /// Keypoints extracted from the object image by the last `process`.
    pub fn object_keypoints(&self) -> Option<&KeypointSet> {
        self.object.as_ref()
    }

    pub fn matches(&self) -> &[Correspondence] {
        &self.matches
    }

    pub fn inliers(&self) -> &[Correspondence] {
        &self.inliers
    }

    pub fn last_report(&self) -> Option<&MatchReport> {
        self.report.as_ref()
    }

    /// Install the precomputed scene keypoints. Only legal in `Idle`.
    pub fn load_scene(&mut self, keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> PipelineResult<()> {
        self.expect_state("load scene keypoints", &[PipelineState::Idle])?;
        let set = KeypointSet::new(keypoints, descriptors);
        let set = self.guard(set.map_err(PipelineError::from))?;
        self.install_scene(set);
        Ok(())
    }

    pub fn load_scene_set(&mut self, set: KeypointSet) -> PipelineResult<()> {
        self.expect_state("load scene keypoints", &[PipelineState::Idle])?;
        self.install_scene(set);
        Ok(())
    }

    /// Read scene keypoints from a JSON keypoint file.
    pub fn load_scene_json<P: AsRef<Path>>(&mut self, path: P) -> PipelineResult<()> {
        self.expect_state("load scene keypoints", &[PipelineState::Idle])?;
        let set = KeypointSet::load_json(path.as_ref());
        let set = self.guard(set.map_err(PipelineError::from))?;
        self.install_scene(set);
        Ok(())
    }

    fn install_scene(&mut self, set: KeypointSet) {
        log::info!("scene: {} keypoints, {}-dim descriptors", set.len(), set.dimension());
        self.scene = Some(set);
        self.state = PipelineState::SceneLoaded;
    }

    /// Decode the object image. Legal once a scene is loaded, including after a finished run.
    pub fn load_object_image<P: AsRef<Path>>(&mut self, path: P) -> PipelineResult<()> {
        self.expect_state("load object image", OBJECT_LOADABLE)?;
        let img = self.guard(decode_luma(path.as_ref()))?;
        self.set_object_image(img)
    }

    pub fn set_object_image(&mut self, image: LumaImage) -> PipelineResult<()> {
        self.expect_state("load object image", OBJECT_LOADABLE)?;
        log::info!("object image: {}x{}", image.width(), image.height());
        self.object_image = Some(image);
        self.clear_run();
        self.state = PipelineState::ObjectLoaded;
        Ok(())
    }

    /// Decode the scene image used for output rendering. Does not change the state.
    pub fn load_scene_image<P: AsRef<Path>>(&mut self, path: P) -> PipelineResult<()> {
        self.expect_not_error("load scene image")?;
        let img = self.guard(decode_luma(path.as_ref()))?;
        self.set_scene_image(img)
    }

    pub fn set_scene_image(&mut self, image: LumaImage) -> PipelineResult<()> {
        self.expect_not_error("load scene image")?;
        log::info!("scene image: {}x{}", image.width(), image.height());
        self.scene_image = Some(image);
        Ok(())
    }

    /// Extract, match and fit, then project the object corners into the scene.
    ///
    /// `ratio` replaces the configured matcher ratio for this run. On failure the
    /// returned [`PipelineFailure`] carries the partial report.
    pub fn process(&mut self, ratio: f64) -> Result<MatchReport, PipelineFailure> {
        if let Err(error) = self.expect_state("process", &[PipelineState::ObjectLoaded, PipelineState::Done]) {
            return Err(PipelineFailure {
                error,
                report: MatchReport::default(),
            });
        }
        self.clear_run();
        let mut report = MatchReport::default();

        let mut matcher_cfg = self.cfg.matcher.clone();
        matcher_cfg.ratio = ratio;
        let matcher = match DescriptorMatcher::new(matcher_cfg) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e.into(), report)),
        };
        let estimator = match HomographyEstimator::new(self.cfg.ransac.clone()) {
            Ok(h) => h,
            Err(e) => return Err(self.fail(e.into(), report)),
        };
        let (Some(object_image), Some(scene)) = (self.object_image.as_ref(), self.scene.as_ref()) else {
            let error = PipelineError::InvalidState {
                operation: "process",
                state: self.state,
            };
            return Err(self.fail(error, report));
        };

        log::info!("(1) extracting object features");
        let threshold = self.cfg.detector.threshold;
        let t0 = Instant::now();
        let extracted = self
            .pool
            .install(|| self.extractor.detect(object_image, threshold));
        report.ftime = t0.elapsed().as_secs_f64();
        let object = match extracted {
            Ok((kps, descs)) => KeypointSet::new(kps, descs).map_err(PipelineError::from),
            Err(e) => Err(PipelineError::Extraction(e.to_string())),
        };
        let object = match object {
            Ok(set) => set,
            Err(e) => return Err(self.fail(e, report)),
        };
        if object.is_empty() {
            log::warn!("no keypoints found in the object image");
        }
        log::debug!("{} object keypoints in {:.4}s", object.len(), report.ftime);
        self.state = PipelineState::FeaturesExtracted;

        log::info!("(2) finding matches");
        let t1 = Instant::now();
        let matched = self.pool.install(|| matcher.match_sets(&object, scene));
        report.mtime = t1.elapsed().as_secs_f64();
        let matches = match matched {
            Ok(m) => m,
            Err(e) => {
                self.object = Some(object);
                return Err(self.fail(e.into(), report));
            }
        };
        report.match_count = matches.len();
        log::info!("{} matches at ratio {}", matches.len(), ratio);
        self.state = PipelineState::Matched;

        log::info!("(3) calculating homography");
        let t2 = Instant::now();
        let fitted = self
            .pool
            .install(|| estimator.estimate_matches(&matches, &object, scene));
        report.htime = t2.elapsed().as_secs_f64();
        self.object = Some(object);
        self.matches = matches;
        let fit = match fitted {
            Ok(fit) => fit,
            Err(e) => {
                report.inlier_count = e.inlier_count().unwrap_or(0);
                return Err(self.fail(e.into(), report));
            }
        };
        report.inlier_count = fit.inlier_count();
        report.homography = Some(*fit.homography());
        self.inliers = fit.inliers;
        self.state = PipelineState::HomographyEstimated;

        log::info!("(4) projecting object corners");
        let (w, h) = object_image.dimensions();
        let corners = image_corners(w as f64, h as f64);
        let Some(quad) = report.homography.as_ref().and_then(|h| project_quad(h, &corners)) else {
            return Err(self.fail(PipelineError::CornersAtInfinity, report));
        };
        report.vertices = Some(quad);

        log::info!(
            "located object: {} inliers of {} matches (f {:.4}s, m {:.4}s, h {:.4}s)",
            report.inlier_count,
            report.match_count,
            report.ftime,
            report.mtime,
            report.htime
        );
        self.state = PipelineState::Done;
        self.report = Some(report.clone());
        Ok(report)
    }

    /// Draw the last successful run over both images and write it to `path`.
    pub fn store_output_image<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let state_error = || PipelineError::InvalidState {
            operation: "store output image",
            state: self.state,
        };
        if self.state != PipelineState::Done {
            return Err(state_error());
        }
        let (Some(object), Some(scene), Some(object_kps), Some(scene_kps)) = (
            self.object_image.as_ref(),
            self.scene_image.as_ref(),
            self.object.as_ref(),
            self.scene.as_ref(),
        ) else {
            return Err(state_error());
        };

        let canvas = render_matches(&MatchDrawing {
            object,
            scene,
            object_keypoints: object_kps,
            scene_keypoints: scene_kps,
            matches: &self.matches,
            inliers: &self.inliers,
            quad: self.report.as_ref().and_then(|r| r.vertices),
        });
        canvas.save(path.as_ref())?;
        log::info!("wrote {}", path.as_ref().display());
        Ok(())
    }

    /// Drop every loaded buffer and go back to `Idle`.
    pub fn reset(&mut self) {
        self.scene = None;
        self.scene_image = None;
        self.object_image = None;
        self.clear_run();
        self.state = PipelineState::Idle;
    }

    /// Alias of [`MatchPipeline::reset`].
    pub fn release(&mut self) {
        self.reset();
    }

    fn clear_run(&mut self) {
        self.object = None;
        self.matches.clear();
        self.inliers.clear();
        self.report = None;
    }

    fn expect_state(&self, operation: &'static str, allowed: &[PipelineState]) -> PipelineResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn expect_not_error(&self, operation: &'static str) -> PipelineResult<()> {
        if self.state == PipelineState::Error {
            Err(PipelineError::InvalidState {
                operation,
                state: self.state,
            })
        } else {
            Ok(())
        }
    }

    /// Move to `Error` when `result` failed.
    fn guard<T>(&mut self, result: PipelineResult<T>) -> PipelineResult<T> {
        if let Err(e) = &result {
            log::error!("{}", e);
            self.state = PipelineState::Error;
        }
        result
    }

    fn fail(&mut self, error: PipelineError, mut report: MatchReport) -> PipelineFailure {
        log::error!("{}", error);
        report.error = Some(error.to_string());
        self.state = PipelineState::Error;
        self.report = Some(report.clone());
        PipelineFailure { error, report }
    }
}

impl<E: FeatureExtractor> Drop for MatchPipeline<E> {
    fn drop(&mut self) {
        self.release();
    }
}

const OBJECT_LOADABLE: &[PipelineState] = &[
    PipelineState::SceneLoaded,
    PipelineState::ObjectLoaded,
    PipelineState::Done,
];

/// Decode any supported image file to 8-bit grayscale.
pub fn decode_luma(path: &Path) -> PipelineResult<LumaImage> {
    let load_error = |reason: String| PipelineError::ImageLoad {
        path: PathBuf::from(path),
        reason,
    };
    let gray = image::ImageReader::open(path)
        .map_err(|e| load_error(e.to_string()))?
        .decode()
        .map_err(|e| load_error(e.to_string()))?
        .to_luma8();
    let (w, h) = gray.dimensions();
    LumaImage::new(w as usize, h as usize, gray.into_raw()).map_err(|e| load_error(e.to_string()))
}
