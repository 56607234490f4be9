//! Error types for layer lowering and the target driver

use std::path::PathBuf;

use thiserror::Error;

use crate::target::SimState;

/// Result alias for conversion operations
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Errors raised while converting or simulating a network
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Simulator error
    #[error("Runtime error: {0}")]
    Runtime(#[from] snnt_runtime::RuntimeError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] snnt_storage::StorageError),

    /// Layer class has no spiking counterpart
    #[error("Unsupported layer '{name}' ({class_name}): {reason}")]
    UnsupportedLayer {
        /// Layer name
        name: String,
        /// Source class name
        class_name: String,
        /// Why it is unsupported
        reason: String,
    },

    /// Layer is supported but malformed (shapes, weights)
    #[error("Invalid layer '{name}': {reason}")]
    InvalidLayer {
        /// Layer name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Operation called in the wrong lifecycle state
    #[error("Cannot {operation} in state {state}")]
    InvalidState {
        /// Operation attempted
        operation: &'static str,
        /// Current state
        state: SimState,
    },

    /// Permanently unimplemented feature
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Feature name
        feature: String,
    },

    /// A connection file required to reload a network is absent
    #[error("Connections were not found at {}", path.display())]
    MissingConnections {
        /// Expected file
        path: PathBuf,
    },

    /// Data does not match the population it targets
    #[error("Shape mismatch for {what}: expected {expected} values, found {found}")]
    ShapeMismatch {
        /// What was being matched
        what: String,
        /// Expected element count
        expected: usize,
        /// Supplied element count
        found: usize,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },
}

impl ConversionError {
    /// Create an invalid layer error
    pub fn invalid_layer(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported layer error
    pub fn unsupported_layer(
        name: impl Into<String>,
        class_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedLayer {
            name: name.into(),
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
