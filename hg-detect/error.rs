#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    InvalidThreshold(f32),
    InvalidPatchSize(usize),
    InvalidOctaveCount(usize),
    InvalidNmsDistance(f32),
    ZeroKeypointBudget,
    ImageTooSmall { width: usize, height: usize, min_size: usize },
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::InvalidThreshold(t) => {
                write!(f, "Invalid threshold: {} (must be positive and finite)", t)
            }
            DetectError::InvalidPatchSize(p) => {
                write!(f, "Invalid patch size: {} (must be odd and at least 7)", p)
            }
            DetectError::InvalidOctaveCount(n) => {
                write!(f, "Invalid octave count: {} (must be 1-8)", n)
            }
            DetectError::InvalidNmsDistance(d) => {
                write!(f, "Invalid NMS distance: {} (must be non-negative)", d)
            }
            DetectError::ZeroKeypointBudget => write!(f, "max_keypoints must be > 0"),
            DetectError::ImageTooSmall { width, height, min_size } => {
                write!(f, "Image {}x{} too small (minimum {}x{})", width, height, min_size, min_size)
            }
        }
    }
}

impl std::error::Error for DetectError {}

pub type DetectResult<T> = Result<T, DetectError>;
