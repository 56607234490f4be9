//! Conversion and simulation configuration
//!
//! Mirrors the `[cell]`, `[simulation]` and `[output]` sections of the
//! toolbox configuration file. Every field has a default so partial files
//! deserialize.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use snnt_runtime::{CellParams, RecordVar};

use crate::error::{ConversionError, Result};

/// Plot keys that require spike recording
const SPIKE_PLOT_KEYS: [&str; 5] = [
    "spiketrains",
    "spikerates",
    "correlation",
    "spikecounts",
    "hist_spikerates_activations",
];

/// Format of the input samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// Numpy arrays of normalised activations
    Npz,
    /// Image files
    Jpg,
    /// Address-event recordings
    Aedat,
}

/// Deep-learning backend the source model was trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KerasBackend {
    /// Cross-correlation kernels
    Tensorflow,
    /// Flipped (true convolution) kernels
    Theano,
}

/// `[cell]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Electrical parameters applied to every non-input population
    #[serde(flatten)]
    pub params: CellParams,
    /// Global synaptic delay (ms)
    pub delay: f64,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            params: CellParams::default(),
            delay: 1.0,
        }
    }
}

/// `[simulation]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// Duration of one sample (ms)
    pub duration: f64,
    /// Integration time step (ms)
    pub dt: f64,
    /// Samples per batch; the SpiNNaker target only runs one at a time
    pub batch_size: usize,
    /// Reset the simulator after every n-th sample; 0 means every sample
    pub reset_between_nth_sample: usize,
    /// Rate-code inputs as Poisson spike sources
    pub poisson_input: bool,
    /// Input dataset format
    pub dataset_format: DatasetFormat,
    /// Backend the source model was trained with
    pub keras_backend: KerasBackend,
    /// Neurons mapped onto one core for `IF_cond_exp` populations
    pub max_neurons_per_core: usize,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            duration: 200.0,
            dt: 0.1,
            batch_size: 1,
            reset_between_nth_sample: 1,
            poisson_input: false,
            dataset_format: DatasetFormat::Npz,
            keras_backend: KerasBackend::Tensorflow,
            max_neurons_per_core: 140,
        }
    }
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Overwrite existing files without asking
    pub overwrite: bool,
    /// Requested plots
    pub plot_vars: BTreeSet<String>,
    /// Requested logged variables
    pub log_vars: BTreeSet<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overwrite: true,
            plot_vars: BTreeSet::new(),
            log_vars: BTreeSet::new(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Cell parameters and synaptic delay
    pub cell: CellConfig,
    /// Timing and input handling
    pub simulation: SimulationSection,
    /// Output policy
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !(sim.dt > 0.0) {
            return Err(ConversionError::invalid_config(format!("dt must be > 0, got {}", sim.dt)));
        }
        if !(sim.duration > 0.0) {
            return Err(ConversionError::invalid_config(format!(
                "duration must be > 0, got {}",
                sim.duration
            )));
        }
        if sim.duration < sim.dt {
            return Err(ConversionError::invalid_config(format!(
                "duration ({}) must be >= dt ({})",
                sim.duration, sim.dt
            )));
        }
        if sim.batch_size != 1 {
            return Err(ConversionError::invalid_config(format!(
                "batch_size must be 1 for this target, got {}",
                sim.batch_size
            )));
        }
        if sim.max_neurons_per_core == 0 {
            return Err(ConversionError::invalid_config("max_neurons_per_core must be > 0"));
        }
        if self.cell.delay < 0.0 {
            return Err(ConversionError::invalid_config(format!(
                "delay must be >= 0, got {}",
                self.cell.delay
            )));
        }
        self.cell.params.validate()?;
        Ok(())
    }

    /// Number of time steps per sample
    pub fn num_timesteps(&self) -> usize {
        (self.simulation.duration / self.simulation.dt).round() as usize
    }

    /// Whether convolution kernels must be flipped before flattening
    pub fn transpose_kernel(&self) -> bool {
        self.simulation.keras_backend == KerasBackend::Tensorflow
    }

    /// Modulus of the reset cadence; an unset cadence resets every sample
    pub fn reset_modulus(&self) -> usize {
        match self.simulation.reset_between_nth_sample {
            0 => 1,
            n => n,
        }
    }

    /// Whether the simulator must be reset after sample `sample_idx`
    pub fn should_reset(&self, sample_idx: usize) -> bool {
        sample_idx % self.reset_modulus() == 0
    }

    /// Variables that downstream plots and logs need recorded
    pub fn vars_to_record(&self) -> Vec<RecordVar> {
        let output = &self.output;
        let mut vars = Vec::new();

        let spikes_plotted = SPIKE_PLOT_KEYS.iter().any(|key| output.plot_vars.contains(*key));
        if spikes_plotted || output.log_vars.contains("spiketrains_n_b_l_t") {
            vars.push(RecordVar::Spikes);
        }
        if output.log_vars.contains("mem_n_b_l_t") || output.plot_vars.contains("v_mem") {
            vars.push(RecordVar::V);
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_timesteps(), 2000);
        assert!(config.transpose_kernel());
        assert_eq!(config.cell.delay, 1.0);
        assert!(config.output.overwrite);
    }

    #[test]
    fn test_validation() {
        let mut config = SimulationConfig::default();
        config.simulation.dt = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.simulation.duration = 0.05;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.simulation.batch_size = 4;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.cell.params.cm = -1.0;
        assert!(matches!(config.validate(), Err(ConversionError::Runtime(_))));
    }

    #[test]
    fn test_reset_cadence() {
        let mut config = SimulationConfig::default();
        config.simulation.reset_between_nth_sample = 0;
        assert!((0..10).all(|i| config.should_reset(i)));

        config.simulation.reset_between_nth_sample = 3;
        let resets: Vec<usize> = (0..10).filter(|i| config.should_reset(*i)).collect();
        assert_eq!(resets, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_vars_to_record() {
        let mut config = SimulationConfig::default();
        assert!(config.vars_to_record().is_empty());

        config.output.plot_vars.insert("spikerates".to_string());
        assert_eq!(config.vars_to_record(), vec![RecordVar::Spikes]);

        config.output.log_vars.insert("mem_n_b_l_t".to_string());
        assert_eq!(config.vars_to_record(), vec![RecordVar::Spikes, RecordVar::V]);

        let mut config = SimulationConfig::default();
        config.output.plot_vars.insert("v_mem".to_string());
        assert_eq!(config.vars_to_record(), vec![RecordVar::V]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{"cell": {"v_thresh": 2.0, "tau_syn_E": 0.5, "delay": 2.0},
                "simulation": {"poisson_input": true, "keras_backend": "theano"}}"#,
        )
        .unwrap();
        assert_eq!(config.cell.params.v_thresh, 2.0);
        assert_eq!(config.cell.params.tau_syn_e, 0.5);
        assert_eq!(config.cell.params.cm, 0.09);
        assert_eq!(config.cell.delay, 2.0);
        assert!(config.simulation.poisson_input);
        assert!(!config.transpose_kernel());
        assert_eq!(config.simulation.duration, 200.0);
    }
}
