//! The contract between the conversion layer and a pyNN-style simulator

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{cell::{CellParams, CellType}, error::*, Connection, Receptor, Structure};

/// Handle to a population created by a [`Simulator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PopulationId(pub usize);

impl PopulationId {
    /// Create a new population handle
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the raw index
    pub const fn raw(&self) -> usize {
        self.0
    }
}

/// Handle to a projection created by a [`Simulator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectionId(pub usize);

impl ProjectionId {
    /// Create a new projection handle
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the raw index
    pub const fn raw(&self) -> usize {
        self.0
    }
}

/// Variables a population can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordVar {
    /// Spike times
    Spikes,
    /// Membrane potential
    V,
}

impl RecordVar {
    /// pyNN name of the variable
    pub const fn name(&self) -> &'static str {
        match self {
            RecordVar::Spikes => "spikes",
            RecordVar::V => "v",
        }
    }
}

impl fmt::Display for RecordVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to create a population
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSpec {
    /// Number of neurons
    pub size: usize,
    /// Neuron model
    pub celltype: CellType,
    /// Initial electrical parameters (cell type defaults when `None`)
    pub params: Option<CellParams>,
    /// Spatial structure
    pub structure: Structure,
    /// Unique label
    pub label: String,
}

impl PopulationSpec {
    /// Create a spec with default parameters and a line structure
    pub fn new(size: usize, celltype: CellType, label: impl Into<String>) -> Self {
        Self {
            size,
            celltype,
            params: None,
            structure: Structure::Line,
            label: label.into(),
        }
    }

    /// Set initial electrical parameters
    pub fn with_params(mut self, params: CellParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Set spatial structure
    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }
}

/// Read-only view of a population
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationInfo {
    /// Unique label
    pub label: String,
    /// Number of neurons
    pub size: usize,
    /// Neuron model
    pub celltype: CellType,
    /// Spatial structure
    pub structure: Structure,
}

/// A pyNN-style simulator.
///
/// Implementations own all runtime behavior: neuron dynamics, event
/// scheduling, hardware mapping and the simulation clock. Every call is
/// blocking. After [`Simulator::end`] all further calls fail with
/// [`RuntimeError::Ended`].
pub trait Simulator {
    /// Configure the integration time step (ms). Must precede everything else.
    fn setup(&mut self, timestep_ms: f64) -> Result<()>;

    /// Current integration time step (ms)
    fn timestep(&self) -> f64;

    /// Limit how many neurons of `celltype` are mapped onto one core
    fn set_neurons_per_core(&mut self, celltype: CellType, max_neurons: usize) -> Result<()>;

    /// Create a population
    fn create_population(&mut self, spec: PopulationSpec) -> Result<PopulationId>;

    /// Describe a population
    fn population(&self, id: PopulationId) -> Result<PopulationInfo>;

    /// Connect two populations with an explicit connection list.
    ///
    /// An empty list is valid and yields a projection without synapses.
    fn create_projection(
        &mut self,
        pre: PopulationId,
        post: PopulationId,
        connections: &[Connection],
        receptor: Receptor,
    ) -> Result<ProjectionId>;

    /// Number of synapses in a projection
    fn projection_size(&self, id: ProjectionId) -> Result<usize>;

    /// Apply electrical parameters to every neuron.
    ///
    /// Per-neuron offset currents already set with
    /// [`Simulator::set_offset_currents`] are left untouched.
    fn set_cell_params(&mut self, id: PopulationId, params: &CellParams) -> Result<()>;

    /// Set the constant offset current of every neuron
    fn set_offset_currents(&mut self, id: PopulationId, offsets: &[f64]) -> Result<()>;

    /// Read back the offset current of every neuron
    fn offset_currents(&self, id: PopulationId) -> Result<Vec<f64>>;

    /// Initialise the membrane potential of every neuron
    fn initialize_membrane(&mut self, id: PopulationId, v: f64) -> Result<()>;

    /// Set the firing rate (Hz) of every neuron of a Poisson source
    fn set_rates(&mut self, id: PopulationId, rates: &[f64]) -> Result<()>;

    /// Start recording `vars` on a population
    fn record(&mut self, id: PopulationId, vars: &[RecordVar]) -> Result<()>;

    /// Advance the simulation by `duration_ms`
    fn run(&mut self, duration_ms: f64) -> Result<()>;

    /// Return to time zero and drop recorded data, keeping the network
    fn reset(&mut self) -> Result<()>;

    /// Release all simulator resources. Terminal.
    fn end(&mut self) -> Result<()>;

    /// Spike times (ms) of every neuron since the last reset
    fn spiketrains(&self, id: PopulationId) -> Result<Vec<Vec<f64>>>;

    /// Membrane potential samples since the last reset, shaped
    /// `(samples, neurons)`
    fn membrane_potentials(&self, id: PopulationId) -> Result<Array2<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_spec_builder() {
        let spec = PopulationSpec::new(12, CellType::IfCondExp, "conv_1")
            .with_params(CellParams::default())
            .with_structure(Structure::Grid2D { aspect_ratio: 1.5 });
        assert_eq!(spec.size, 12);
        assert_eq!(spec.params, Some(CellParams::default()));
        assert_eq!(spec.structure, Structure::Grid2D { aspect_ratio: 1.5 });
    }

    #[test]
    fn test_record_var_names() {
        assert_eq!(RecordVar::Spikes.to_string(), "spikes");
        assert_eq!(RecordVar::V.to_string(), "v");
    }

    #[test]
    fn test_handles() {
        assert_eq!(PopulationId::new(3).raw(), 3);
        assert_eq!(ProjectionId::new(5).raw(), 5);
    }
}
