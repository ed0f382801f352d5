//! Error types for block compression and decompression.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Codec error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller-provided output buffer cannot hold the result.
    #[error("destination too small: need {required} bytes, got {provided}")]
    DestinationTooSmall { required: usize, provided: usize },

    /// Compressed input is malformed, truncated or references data outside the window.
    #[error("corrupted data: {message}")]
    CorruptedData {
        message: String,
        /// Byte offset into the compressed input, when known.
        offset: Option<usize>,
    },

    /// An internal invariant was breached by the caller.
    #[error("precondition violated: {0}")]
    PreconditionViolated(&'static str),

    /// Compression level outside the supported range.
    #[error("invalid compression level {level}: must be in range [{min}, {max}]")]
    InvalidLevel { level: i32, min: i32, max: i32 },
}

impl Error {
    /// Create a corrupted data error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::CorruptedData {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a corrupted data error with offset context.
    pub fn corrupted_at(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptedData {
            message: format!("{} at offset {}", message.into(), offset),
            offset: Some(offset),
        }
    }

    /// Create a destination too small error.
    pub fn destination_too_small(required: usize, provided: usize) -> Self {
        Error::DestinationTooSmall { required, provided }
    }

    /// Check if error is recoverable (can retry with a larger buffer).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DestinationTooSmall { .. })
    }

    /// Get error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::DestinationTooSmall { .. } => "destination_too_small",
            Error::CorruptedData { .. } => "corrupted_data",
            Error::PreconditionViolated(_) => "precondition_violated",
            Error::InvalidLevel { .. } => "invalid_level",
        }
    }
}
