//! Error types for the fusion engine

use thiserror::Error;
use voxfuse_io::ReadError;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Depth, color or pose file absent for a frame
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Pose not 4x4, depth array of the wrong shape, etc.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Block allocation could not be satisfied
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Invalid parameters or unavailable device, detected before integration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error only concerns the frame being loaded.
    /// Frame-local errors are logged and the frame skipped; everything else
    /// terminates the run.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Error::MissingInput(_) | Error::MalformedInput(_))
    }
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Missing(path) => Error::MissingInput(path.display().to_string()),
            other => Error::MalformedInput(other.to_string()),
        }
    }
}
