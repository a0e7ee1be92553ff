#[derive(Debug)]
pub enum CoreError {
    IndexOutOfRange { index: usize, len: usize },
    CountMismatch { keypoints: usize, descriptors: usize },
    DescriptorLength { index: usize, expected: usize, actual: usize },
    DimensionRemainder { values: usize, dim: usize },
    DimensionMismatch { declared: usize, actual: usize },
    ZeroDimension,
    InvalidImage { width: usize, height: usize, len: usize },
    Malformed { entry: String, reason: String },
    Io(std::io::Error),
    #[cfg(feature = "serde")]
    Json(serde_json::Error),
}

impl CoreError {
    /// True for every malformed-input variant (the `FormatError` kind).
    pub fn is_format_error(&self) -> bool {
        match self {
            CoreError::IndexOutOfRange { .. } | CoreError::Io(_) => false,
            _ => true,
        }
    }

    /// True for an out-of-range lookup (the `IndexError` kind).
    pub fn is_index_error(&self) -> bool {
        matches!(self, CoreError::IndexOutOfRange { .. })
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for keypoint set of length {}", index, len)
            }
            CoreError::CountMismatch { keypoints, descriptors } => {
                write!(f, "Keypoint/descriptor count mismatch: {} keypoints, {} descriptors", keypoints, descriptors)
            }
            CoreError::DescriptorLength { index, expected, actual } => {
                write!(f, "Descriptor {} has length {} (expected {})", index, actual, expected)
            }
            CoreError::DimensionRemainder { values, dim } => {
                write!(f, "{} descriptor values are not a multiple of dimension {}", values, dim)
            }
            CoreError::DimensionMismatch { declared, actual } => {
                write!(f, "Declared descriptor dimension {} does not match actual dimension {}", declared, actual)
            }
            CoreError::ZeroDimension => write!(f, "Descriptor dimension must be > 0"),
            CoreError::InvalidImage { width, height, len } => {
                write!(f, "Invalid {}x{} image with {} bytes of pixel data", width, height, len)
            }
            CoreError::Malformed { entry, reason } => {
                write!(f, "Malformed keypoint entry {}: {}", entry, reason)
            }
            CoreError::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "serde")]
            CoreError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Io(e) => Some(e),
            #[cfg(feature = "serde")]
            CoreError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Json(err)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
