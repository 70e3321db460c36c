//! Error type for frame decoding

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading one input file
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file does not exist
    #[error("missing file: {}", .0.display())]
    Missing(PathBuf),

    /// The file exists but its contents cannot be interpreted
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] ::image::ImageError),
}

impl ReadError {
    /// Prefix a malformed-input message with the offending path
    pub(crate) fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            ReadError::Malformed(reason) => {
                ReadError::Malformed(format!("{}: {}", path.display(), reason))
            }
            other => other,
        }
    }
}
