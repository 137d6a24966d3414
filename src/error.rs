//! Error taxonomy for index construction and persistence.
//!
//! Identification itself never returns these: a failed identification is a
//! structured [`crate::NoMatchReason`], not an error.

use thiserror::Error;

pub type SphtResult<T> = Result<T, SphtError>;

#[derive(Debug, Error)]
pub enum SphtError {
    /// Malformed or insufficient input (catalog subset, quantization step, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// A persisted index was built with a different quantization step than requested.
    #[error("quantization step mismatch: expected {expected} deg, snapshot has {found} deg")]
    VersionMismatch { expected: f64, found: f64 },

    /// A persisted index failed to decode or references unknown catalog stars.
    #[error("corrupt index data: {0}")]
    CorruptData(String),

    /// The index could not be encoded into a snapshot.
    #[error("failed to encode index: {0}")]
    Encode(String),

    /// Index construction was cancelled or exceeded its time budget.
    #[error("index build aborted: {0}")]
    BuildAborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SphtError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptData(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = SphtError::validation("need at least 2 stars");
        assert!(err.to_string().contains("need at least 2 stars"));
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = SphtError::VersionMismatch {
            expected: 1.0,
            found: 0.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 1"));
        assert!(msg.contains("0.5"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: SphtError = io.into();
        assert!(matches!(err, SphtError::Io(_)));
    }
}
