use std::path::Path;

use hg_detect::DetectorConfig;
use hg_homography::RansacConfig;
use hg_match::MatcherConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Every tunable of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads of the pipeline's private pool
    pub n_threads: usize,
    pub matcher: MatcherConfig,
    pub ransac: RansacConfig,
    pub detector: DetectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get().max(1),
            matcher: MatcherConfig::default(),
            ransac: RansacConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ransac.seed = Some(seed);
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.matcher.validate()?;
        self.ransac.validate()?;
        self.detector
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if self.n_threads == 0 {
            return Err(PipelineError::Config("n_threads must be > 0".into()));
        }
        Ok(())
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "ratio={} cross_check={} threshold={} ransac(iters={}, reproj={}px, seed={:?}) threads={}",
            self.matcher.ratio,
            self.matcher.cross_check,
            self.detector.threshold,
            self.ransac.max_iters,
            self.ransac.inlier_threshold,
            self.ransac.seed,
            self.n_threads
        )
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> PipelineResult<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        let cfg: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a `.json` or `.toml` file.
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match extension(path).as_deref() {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(unsupported(path)),
        }
    }

    /// Save as JSON or TOML depending on the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let path = path.as_ref();
        let text = match extension(path).as_deref() {
            Some("json") => self.to_json()?,
            Some("toml") => self.to_toml()?,
            _ => return Err(unsupported(path)),
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn unsupported(path: &Path) -> PipelineError {
    PipelineError::Config(format!(
        "unsupported config format {} (expected .json or .toml)",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_is_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.matcher.ratio, 0.6);
        assert!(cfg.n_threads >= 1);
    }

    #[test]
    fn test_json_and_toml_roundtrip() {
        let cfg = PipelineConfig::default().with_seed(42).with_threads(3);
        assert_eq!(PipelineConfig::from_json(&cfg.to_json().unwrap()).unwrap(), cfg);
        assert_eq!(PipelineConfig::from_toml(&cfg.to_toml().unwrap()).unwrap(), cfg);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg = PipelineConfig::from_toml("n_threads = 2\n[matcher]\nratio = 0.7\n").unwrap();
        assert_eq!(cfg.n_threads, 2);
        assert_eq!(cfg.matcher.ratio, 0.7);
        assert_eq!(cfg.ransac, RansacConfig::default());

        let cfg = PipelineConfig::from_json(r#"{"ransac": {"seed": 9, "max_iters": 500}}"#).unwrap();
        assert_eq!(cfg.ransac.seed, Some(9));
        assert_eq!(cfg.ransac.max_iters, 500);
        assert_eq!(cfg.ransac.inlier_threshold, 3.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PipelineConfig::from_json(r#"{"matcher": {"ratio": 1.5}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = PipelineConfig::from_toml("n_threads = 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = PipelineConfig::from_json(r#"{"detector": {"patch_size": 8}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(PipelineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_file_roundtrip_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::default().with_seed(7);
        for name in ["cfg.json", "cfg.toml"] {
            let path = dir.path().join(name);
            cfg.save(&path).unwrap();
            assert_eq!(PipelineConfig::load(&path).unwrap(), cfg);
        }
        let yaml = dir.path().join("cfg.yaml");
        assert!(cfg.save(&yaml).is_err());
        std::fs::write(&yaml, "n_threads: 1").unwrap();
        assert_eq!(PipelineConfig::load(&yaml).unwrap_err().kind(), ErrorKind::Config);
    }
}
