//! Error types for the simulator layer

use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while driving a simulator
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Population handle does not refer to a live population
    #[error("Population {id} not found")]
    PopulationNotFound {
        /// Raw population index
        id: usize,
    },

    /// Projection handle does not refer to a live projection
    #[error("Projection {id} not found")]
    ProjectionNotFound {
        /// Raw projection index
        id: usize,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A per-neuron vector does not match the population size
    #[error("Size mismatch for {what}: expected {expected}, found {found}")]
    SizeMismatch {
        /// What was being set
        what: String,
        /// Population size
        expected: usize,
        /// Length supplied
        found: usize,
    },

    /// Connection refers to a neuron outside its population
    #[error("Connection index {index} out of range for population '{label}' of size {size}")]
    ConnectionOutOfRange {
        /// Population label
        label: String,
        /// Offending index
        index: usize,
        /// Population size
        size: usize,
    },

    /// Operation does not apply to this cell type
    #[error("Operation '{operation}' not supported by cell type {celltype} (population '{label}')")]
    IncompatibleCellType {
        /// Population label
        label: String,
        /// Cell type name
        celltype: String,
        /// Operation attempted
        operation: String,
    },

    /// Data was requested for a variable that is not being recorded
    #[error("Variable '{variable}' is not recorded for population '{label}'")]
    NotRecorded {
        /// Population label
        label: String,
        /// Variable name
        variable: String,
    },

    /// Unknown cell type name
    #[error("Unknown cell type: {name}")]
    UnknownCellType {
        /// Name that failed to resolve
        name: String,
    },

    /// Simulator was used before `setup`
    #[error("Simulator has not been set up")]
    NotSetUp,

    /// Simulator was used after `end`
    #[error("Simulator has already been ended")]
    Ended,
}

impl RuntimeError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a size mismatch error
    pub fn size_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::SizeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    /// Create a not-recorded error
    pub fn not_recorded(label: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::NotRecorded {
            label: label.into(),
            variable: variable.into(),
        }
    }
}
