use hg_core::CoreError;

#[derive(Debug)]
pub enum HomographyError {
    InsufficientData { needed: usize, got: usize },
    LengthMismatch { src: usize, dst: usize },
    NoConsensus { trials: usize },
    Singular { condition: f64, inliers: usize },
    InsufficientInliers { needed: usize, found: usize },
    InvalidConfig(String),
    Core(CoreError),
}

impl HomographyError {
    /// Matches were available but no reliable geometry came out of them.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            HomographyError::NoConsensus { .. }
                | HomographyError::Singular { .. }
                | HomographyError::InsufficientInliers { .. }
        )
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, HomographyError::InsufficientData { .. })
    }

    /// Inlier count of the best model, when one was found before failing.
    pub fn inlier_count(&self) -> Option<usize> {
        match self {
            HomographyError::NoConsensus { .. } => Some(0),
            HomographyError::Singular { inliers, .. } => Some(*inliers),
            HomographyError::InsufficientInliers { found, .. } => Some(*found),
            _ => None,
        }
    }
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HomographyError::InsufficientData { needed, got } => {
                write!(f, "Too few correspondences: need {}, got {}", needed, got)
            }
            HomographyError::LengthMismatch { src, dst } => {
                write!(f, "Point list length mismatch: {} source, {} destination", src, dst)
            }
            HomographyError::NoConsensus { trials } => {
                write!(f, "No non-degenerate sample found in {} trials", trials)
            }
            HomographyError::Singular { condition, inliers } => {
                write!(f, "Singular homography (condition {:.3e}, {} inliers)", condition, inliers)
            }
            HomographyError::InsufficientInliers { needed, found } => {
                write!(f, "Insufficient inliers: need {}, found {}", needed, found)
            }
            HomographyError::InvalidConfig(msg) => write!(f, "Invalid RANSAC configuration: {}", msg),
            HomographyError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HomographyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HomographyError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for HomographyError {
    fn from(err: CoreError) -> Self {
        HomographyError::Core(err)
    }
}

pub type HomographyResult<T> = Result<T, HomographyError>;
