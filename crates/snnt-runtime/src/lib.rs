//! Simulator contract for snnt
//!
//! The converted network is executed by an external pyNN-style simulator
//! (SpiNNaker in production). This crate describes what the conversion layer
//! needs from such a simulator as the [`Simulator`] trait, together with the
//! value types that cross it, and ships [`ReferenceSimulator`], a small
//! in-process backend used for dry runs and as the test double.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export essential types from storage
pub use snnt_storage::{
    Connection, Receptor, Structure, INPUT_LABEL,
    Result as StorageResult, StorageError,
};

// Core modules
pub mod cell;
pub mod error;
pub mod reference;
pub mod simulator;

// Re-export essential types
pub use cell::{CellParams, CellType};
pub use error::{Result, RuntimeError};
pub use reference::ReferenceSimulator;
pub use simulator::{
    PopulationId, PopulationInfo, PopulationSpec, ProjectionId, RecordVar, Simulator,
};

/// Default simulation time step (ms)
pub const DEFAULT_TIMESTEP_MS: f64 = 0.1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let params = CellParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(CellType::IfCondExp.name(), "IF_cond_exp");

        let mut sim = ReferenceSimulator::new(7);
        sim.setup(DEFAULT_TIMESTEP_MS).unwrap();
        assert_eq!(sim.timestep(), DEFAULT_TIMESTEP_MS);
    }
}
