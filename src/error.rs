use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, DbnError>;

/// Recoverable failures: persistence, configuration and thread-pool setup.
///
/// Broken training preconditions (sample/label count mismatch, no room for
/// label units) are programmer errors and panic instead.
#[derive(Debug)]
pub enum DbnError {
    Io(io::Error),
    Json(serde_json::Error),
    ThreadPool(rayon::ThreadPoolBuildError),
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    MissingBlock {
        index: usize,
    },
    InvalidSpec(String),
}

impl Display for DbnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DbnError::Io(e) => format!("I/O error: {e}"),
            DbnError::Json(e) => format!("Malformed parameter block: {e}"),
            DbnError::ThreadPool(e) => format!("Failed to build the worker pool: {e}"),
            DbnError::SizeMismatch {
                what,
                got,
                expected,
            } => format!("There's a size mismatch in {what}, got {got} and expected {expected}"),
            DbnError::MissingBlock { index } => {
                format!("The stream ended before the parameter block of layer {index}")
            }
            DbnError::InvalidSpec(reason) => format!("Invalid network description: {reason}"),
        };

        write!(f, "{s}")
    }
}

impl Error for DbnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DbnError::Io(e) => Some(e),
            DbnError::Json(e) => Some(e),
            DbnError::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DbnError {
    fn from(e: io::Error) -> Self {
        DbnError::Io(e)
    }
}

impl From<serde_json::Error> for DbnError {
    fn from(e: serde_json::Error) -> Self {
        DbnError::Json(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for DbnError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        DbnError::ThreadPool(e)
    }
}
