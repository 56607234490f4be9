//! Error types for the storage layer

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// A file that must exist was not found
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Invalid file format or corrupted data
    #[error("Invalid format: {reason}")]
    InvalidFormat {
        /// Reason for invalid format
        reason: String,
    },

    /// Encoding or decoding the assembly record failed
    #[error("Serialization error: {reason}")]
    Serialization {
        /// Reason reported by the codec
        reason: String,
    },

    /// Population label appears more than once
    #[error("Duplicate population label: {label}")]
    DuplicateLabel {
        /// Offending label
        label: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// Source I/O error
        source: std::io::Error,
    },
}

impl StorageError {
    /// Create a not-found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StorageError::invalid_format("test reason");
        assert!(matches!(err, StorageError::InvalidFormat { .. }));

        let err = StorageError::not_found("/tmp/missing");
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("net/layer_1");
        let msg = format!("{}", err);
        assert!(msg.contains("File not found"));
        assert!(msg.contains("layer_1"));
    }
}
