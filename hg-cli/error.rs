use std::path::PathBuf;

use hg_core::CoreError;
use hg_homography::HomographyError;
use hg_match::MatchError;

use crate::pipeline::PipelineState;
use crate::report::MatchReport;

/// Coarse classification of every pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ImageLoad,
    Format,
    InsufficientData,
    DegenerateHomography,
    Extraction,
    Matching,
    State,
    Config,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ImageLoad => "image load error",
            ErrorKind::Format => "format error",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::DegenerateHomography => "degenerate homography",
            ErrorKind::Extraction => "extraction error",
            ErrorKind::Matching => "matching error",
            ErrorKind::State => "invalid state",
            ErrorKind::Config => "configuration error",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum PipelineError {
    ImageLoad { path: PathBuf, reason: String },
    Keypoints(CoreError),
    Extraction(String),
    Matching(MatchError),
    Homography(HomographyError),
    CornersAtInfinity,
    InvalidState { operation: &'static str, state: PipelineState },
    Config(String),
    ThreadPool(rayon::ThreadPoolBuildError),
    Render(image::ImageError),
    Io(std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ImageLoad { .. } => ErrorKind::ImageLoad,
            PipelineError::Keypoints(CoreError::Io(_)) => ErrorKind::Io,
            PipelineError::Keypoints(_) => ErrorKind::Format,
            PipelineError::Extraction(_) => ErrorKind::Extraction,
            PipelineError::Matching(MatchError::InvalidRatio(_)) => ErrorKind::Config,
            PipelineError::Matching(_) => ErrorKind::Matching,
            PipelineError::Homography(e) if e.is_insufficient_data() => ErrorKind::InsufficientData,
            PipelineError::Homography(HomographyError::InvalidConfig(_)) => ErrorKind::Config,
            PipelineError::Homography(HomographyError::Core(_)) => ErrorKind::Format,
            PipelineError::Homography(_) => ErrorKind::DegenerateHomography,
            PipelineError::CornersAtInfinity => ErrorKind::DegenerateHomography,
            PipelineError::InvalidState { .. } => ErrorKind::State,
            PipelineError::Config(_) | PipelineError::ThreadPool(_) => ErrorKind::Config,
            PipelineError::Render(_) | PipelineError::Io(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::ImageLoad { path, reason } => {
                write!(f, "Failed to load image {}: {}", path.display(), reason)
            }
            PipelineError::Keypoints(e) => write!(f, "Keypoint data error: {}", e),
            PipelineError::Extraction(msg) => write!(f, "Feature extraction failed: {}", msg),
            PipelineError::Matching(e) => write!(f, "Matching failed: {}", e),
            PipelineError::Homography(e) => write!(f, "Homography estimation failed: {}", e),
            PipelineError::CornersAtInfinity => {
                write!(f, "Homography maps an object corner to infinity")
            }
            PipelineError::InvalidState { operation, state } => {
                write!(f, "Cannot {} in state {}", operation, state)
            }
            PipelineError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            PipelineError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
            PipelineError::Render(e) => write!(f, "Failed to write output image: {}", e),
            PipelineError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Keypoints(e) => Some(e),
            PipelineError::Matching(e) => Some(e),
            PipelineError::Homography(e) => Some(e),
            PipelineError::ThreadPool(e) => Some(e),
            PipelineError::Render(e) => Some(e),
            PipelineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        PipelineError::Keypoints(err)
    }
}

impl From<MatchError> for PipelineError {
    fn from(err: MatchError) -> Self {
        PipelineError::Matching(err)
    }
}

impl From<HomographyError> for PipelineError {
    fn from(err: HomographyError) -> Self {
        PipelineError::Homography(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for PipelineError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PipelineError::ThreadPool(err)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Render(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A failed `process` run together with everything measured before it failed.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub report: MatchReport,
}

impl PipelineFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} matches, {} inliers)",
            self.error, self.report.match_count, self.report.inlier_count
        )
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
