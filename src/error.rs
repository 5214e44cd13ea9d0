//! Error types for the offline buffer.

use std::io;

use thiserror::Error;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors surfaced to callers of `record`, `replay` and friends.
///
/// Lines that fail to decode during a replay are not errors; they are
/// dropped and counted in the buffer statistics instead.
#[derive(Debug, Error)]
pub enum BufferError {
    /// A storage operation failed.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The payload could not be encoded as JSON.
    #[error("failed to encode record: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl BufferError {
    /// Returns true if the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BufferError::Io { source } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: BufferError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_serialization_error_is_not_io() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BufferError = source.into();
        assert!(!err.is_not_found());
        assert!(matches!(err, BufferError::Serialization { .. }));
    }
}
