//! Error types for AVI demuxing

use std::io;
use thiserror::Error;

/// Result type for AVI operations
pub type Result<T> = std::result::Result<T, AviError>;

/// Errors that can occur while opening or reading an AVI file
#[derive(Error, Debug)]
pub enum AviError {
    /// IO error during read/seek
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The header is not a well-formed AVI header
    #[error("Malformed AVI header: {0}")]
    MalformedHeader(String),

    /// The number of stream headers does not match the declared count
    #[error("Stream count mismatch: header declares {declared}, found {found} stream headers")]
    StreamCountMismatch {
        /// Count from the main header.
        declared: usize,
        /// Stream headers actually seen before the movi list.
        found: usize,
    },

    /// A packet buffer could not be allocated
    #[error("Failed to allocate {size} byte packet buffer")]
    AllocationFailure {
        /// Requested buffer size in bytes.
        size: usize,
    },

    /// Stream index out of range
    #[error("Stream {0} not found")]
    StreamNotFound(usize),

    /// Seek could not be resolved through the index
    #[error("Seek failed: {0}")]
    SeekFailed(String),
}

impl AviError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        AviError::MalformedHeader(msg.into())
    }

    /// Check if this error rejects the file at open time.
    pub fn is_malformed_header(&self) -> bool {
        matches!(
            self,
            AviError::MalformedHeader(_) | AviError::StreamCountMismatch { .. }
        )
    }

    /// Treat running out of input as a malformed header.
    pub(crate) fn in_header(self, offset: u64) -> Self {
        match self {
            AviError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                AviError::MalformedHeader(format!("unexpected end of input at offset {}", offset))
            }
            other => other,
        }
    }
}

/// Convert AviError to transcode_core::Error.
impl From<AviError> for transcode_core::error::Error {
    fn from(err: AviError) -> Self {
        use transcode_core::error::{ContainerError, Error};

        match err {
            AviError::Io(e) => Error::Io(e),
            AviError::MalformedHeader(_) | AviError::StreamCountMismatch { .. } => {
                Error::Container(ContainerError::InvalidStructure(err.to_string()))
            }
            AviError::AllocationFailure { .. } => Error::ResourceExhausted(err.to_string()),
            AviError::StreamNotFound(index) => Error::Container(ContainerError::StreamNotFound {
                index: index as u32,
            }),
            AviError::SeekFailed(msg) => Error::Container(ContainerError::SeekFailed(msg)),
        }
    }
}
