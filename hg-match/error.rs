#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    InvalidRatio(f64),
    DimensionMismatch { object: usize, scene: usize },
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::InvalidRatio(r) => {
                write!(f, "Invalid ratio: {} (must be in (0, 1))", r)
            }
            MatchError::DimensionMismatch { object, scene } => {
                write!(f, "Descriptor dimension mismatch: object {}, scene {}", object, scene)
            }
        }
    }
}

impl std::error::Error for MatchError {}

pub type MatchResult<T> = Result<T, MatchError>;
