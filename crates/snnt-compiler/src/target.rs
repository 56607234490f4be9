//! SpiNNaker target driver
//!
//! [`SpiNNakerSnn`] turns a translated layer list into populations and
//! projections on any [`Simulator`], and drives the sample lifecycle:
//!
//! ```text
//! UNBUILT -> BUILT -> INITIALIZED -> RAN -> (RESET -> INITIALIZED) -> ENDED
//! ```
//!
//! Populations are created in layer order and each layer's projections are
//! attached right after its population, so the previous population always
//! exists. Biases are applied to the newest population only, after its
//! projections.

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use snnt_runtime::{
    CellType, PopulationId, PopulationSpec, ProjectionId, RecordVar, Simulator,
};
use snnt_storage::{
    read_connection_file, write_connection_file, AssemblyRecord, Connection, PopulationRecord,
    Receptor, StorageError, Structure, INPUT_LABEL,
};

use crate::config::{DatasetFormat, SimulationConfig};
use crate::connections::{partition_by_sign, split_weights, ConnectionLists};
use crate::error::{ConversionError, Result};
use crate::kernels;
use crate::layer::{check_label, structure_for_shape, Activation, ConvLayer, DenseLayer, Layer, PoolingKind, PoolingLayer};
use crate::spiketrains::{reshape_flattened_spiketrains, spike_counts, spike_index};

/// Poisson rate (Hz) per unit of normalised input activation
pub const POISSON_RATE_SCALE: f64 = 500.0;

/// Lifecycle state of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// No populations yet
    Unbuilt,
    /// Populations and projections exist
    Built,
    /// Cell parameters applied and recording configured
    Initialized,
    /// At least one sample simulated since the last reset
    Ran,
    /// Simulator returned to time zero
    Reset,
    /// Simulator released
    Ended,
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimState::Unbuilt => "UNBUILT",
            SimState::Built => "BUILT",
            SimState::Initialized => "INITIALIZED",
            SimState::Ran => "RAN",
            SimState::Reset => "RESET",
            SimState::Ended => "ENDED",
        };
        f.write_str(name)
    }
}

/// Non-fatal substitutions made while building
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// Softmax has no spiking counterpart; the layer behaves as relu
    SoftmaxSubstituted {
        /// Layer name
        layer: String,
    },
    /// Max pooling was lowered as average pooling
    MaxPoolingFallback {
        /// Layer name
        layer: String,
    },
    /// Non-zero biases were applied as offset currents
    BiasesApplied {
        /// Layer name
        layer: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::SoftmaxSubstituted { layer } => write!(
                f,
                "Layer '{}': activation 'softmax' not implemented, using 'relu' instead",
                layer
            ),
            BuildWarning::MaxPoolingFallback { layer } => write!(
                f,
                "Layer '{}': max pooling not supported, falling back to average pooling",
                layer
            ),
            BuildWarning::BiasesApplied { layer } => write!(
                f,
                "Layer '{}': biases are applied as offset currents and might have no effect",
                layer
            ),
        }
    }
}

/// Asked before an existing file is replaced
pub trait ConfirmOverwrite {
    /// Return true to replace `path`
    fn confirm_overwrite(&mut self, path: &Path) -> bool;
}

impl<F> ConfirmOverwrite for F
where
    F: FnMut(&Path) -> bool,
{
    fn confirm_overwrite(&mut self, path: &Path) -> bool {
        self(path)
    }
}

/// A population created by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationEntry {
    /// Simulator handle
    pub id: PopulationId,
    /// Label (layer name)
    pub label: String,
    /// Neuron count
    pub size: usize,
    /// Layer output shape without batch dimension
    pub shape: Vec<usize>,
    /// Neuron model
    pub celltype: CellType,
    /// Spatial structure
    pub structure: Structure,
    /// Variables being recorded
    pub recorded: Vec<RecordVar>,
}

impl PopulationEntry {
    fn records(&self, var: RecordVar) -> bool {
        self.recorded.contains(&var)
    }
}

/// A projection created by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRecord {
    /// Simulator handle
    pub id: ProjectionId,
    /// Index of the presynaptic population
    pub pre: usize,
    /// Index of the postsynaptic population
    pub post: usize,
    /// Receptor targeted
    pub receptor: Receptor,
    /// Synapses
    pub connections: Vec<Connection>,
}

/// Data recorded from one non-input layer during a sample
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecording {
    /// Population label
    pub label: String,
    /// `[batch, dims..., time]` spike tensor, when spikes are recorded
    pub spiketrains: Option<ArrayD<f64>>,
    /// `[batch, dims..., samples]` membrane tensor, when `v` is recorded
    pub vmem: Option<ArrayD<f64>>,
}

/// Everything recorded while simulating one sample
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOutput {
    /// `[batch, input dims..., time]`
    pub input_spiketrains: ArrayD<f64>,
    /// One entry per non-input population
    pub layers: Vec<LayerRecording>,
    /// Spikes emitted by each output neuron during the sample
    pub output_spike_counts: Vec<usize>,
}

impl RecordedOutput {
    /// Index of the most active output neuron; `None` when the output is silent
    pub fn classification(&self) -> Option<usize> {
        let (index, &count) = self
            .output_spike_counts
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, count)| **count)?;
        (count > 0).then_some(index)
    }
}

/// Result of [`SpiNNakerSnn::run_samples`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Samples simulated
    pub samples: usize,
    /// Samples classified correctly
    pub correct: usize,
    /// Per-sample guesses
    pub guesses: Vec<Option<usize>>,
    /// Per-sample output spike counts
    pub spike_counts: Vec<Vec<usize>>,
}

impl RunSummary {
    /// Fraction of correct guesses
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.correct as f64 / self.samples as f64
        }
    }
}

/// Files written by [`SpiNNakerSnn::save`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    /// Assembly file, unless the overwrite was declined
    pub assembly: Option<PathBuf>,
    /// Connection files written
    pub connections: Vec<PathBuf>,
    /// Existing files left untouched
    pub skipped: Vec<PathBuf>,
}

/// Spiking network compiled for a pyNN-style SpiNNaker simulator
pub struct SpiNNakerSnn<S: Simulator> {
    sim: S,
    config: SimulationConfig,
    state: SimState,
    populations: Vec<PopulationEntry>,
    projections: Vec<ProjectionRecord>,
    warnings: Vec<BuildWarning>,
    /// Simulator steps run since the last reset
    elapsed_steps: usize,
    /// First step of the most recent sample window
    window_start_step: usize,
}

impl<S: Simulator> SpiNNakerSnn<S> {
    /// Validate `config` and set up the simulator with its time step
    pub fn new(mut sim: S, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        sim.setup(config.simulation.dt)?;
        log::info!(
            "SpiNNaker target ready: dt={}ms, duration={}ms",
            config.simulation.dt,
            config.simulation.duration
        );
        Ok(Self {
            sim,
            config,
            state: SimState::Unbuilt,
            populations: Vec::new(),
            projections: Vec::new(),
            warnings: Vec::new(),
            elapsed_steps: 0,
            window_start_step: 0,
        })
    }

    /// Samples cannot be simulated in parallel on this target
    pub fn is_parallelizable(&self) -> bool {
        false
    }

    /// Current lifecycle state
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Warnings collected while building
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Populations in creation order
    pub fn populations(&self) -> &[PopulationEntry] {
        &self.populations
    }

    /// Projections in creation order
    pub fn projections(&self) -> &[ProjectionRecord] {
        &self.projections
    }

    /// Underlying simulator
    pub fn simulator(&self) -> &S {
        &self.sim
    }

    /// Time steps per sample
    pub fn num_timesteps(&self) -> usize {
        self.config.num_timesteps()
    }

    fn require(&self, operation: &'static str, allowed: &[SimState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ConversionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn warn(&mut self, warning: BuildWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn output_index(&self) -> usize {
        self.populations.len().saturating_sub(1)
    }

    /// Build populations and projections for `layers`.
    ///
    /// The first layer must be the input layer. The simulator cannot drop
    /// populations, so a failed build ends the driver and a new one must be
    /// created to retry.
    pub fn build(&mut self, layers: &[Layer]) -> Result<()> {
        self.require("build", &[SimState::Unbuilt])?;
        if let Err(err) = self.build_layers(layers) {
            log::error!("Build failed after {} populations: {}", self.populations.len(), err);
            if let Err(end_err) = self.sim.end() {
                log::warn!("Failed to release simulator: {}", end_err);
            }
            self.state = SimState::Ended;
            return Err(err);
        }

        self.state = SimState::Built;
        log::info!(
            "Built {} populations and {} projections",
            self.populations.len(),
            self.projections.len()
        );
        Ok(())
    }

    fn build_layers(&mut self, layers: &[Layer]) -> Result<()> {
        match layers.first() {
            Some(Layer::Input { shape }) => {
                self.add_input_layer(shape)?;
            }
            _ => {
                return Err(ConversionError::invalid_layer(
                    INPUT_LABEL,
                    "network must start with an input layer",
                ))
            }
        }

        for layer in &layers[1..] {
            if self.add_layer(layer)?.is_none() {
                continue;
            }
            match layer {
                Layer::Dense(dense) => self.build_dense(dense)?,
                Layer::Convolution(conv) => self.build_convolution(conv)?,
                Layer::Pooling(pool) => self.build_pooling(pool)?,
                Layer::Input { .. } | Layer::Flatten { .. } => {}
            }
        }
        Ok(())
    }

    /// Create the Poisson input population
    pub fn add_input_layer(&mut self, shape: &[usize]) -> Result<PopulationId> {
        self.require("add input layer", &[SimState::Unbuilt])?;
        if !self.populations.is_empty() {
            return Err(ConversionError::invalid_layer(INPUT_LABEL, "input layer already exists"));
        }
        let size = shape.iter().product();
        let structure = structure_for_shape(shape);
        let spec = PopulationSpec::new(size, CellType::SpikeSourcePoisson, INPUT_LABEL).with_structure(structure);
        let id = self.sim.create_population(spec)?;
        self.populations.push(PopulationEntry {
            id,
            label: INPUT_LABEL.to_string(),
            size,
            shape: shape.to_vec(),
            celltype: CellType::SpikeSourcePoisson,
            structure,
            recorded: Vec::new(),
        });
        Ok(id)
    }

    /// Create the population of a non-input layer. Flatten layers create
    /// nothing and yield `None`.
    pub fn add_layer(&mut self, layer: &Layer) -> Result<Option<PopulationId>> {
        self.require("add layer", &[SimState::Unbuilt])?;
        match layer {
            Layer::Flatten { .. } => return Ok(None),
            Layer::Input { .. } => {
                return Err(ConversionError::invalid_layer(INPUT_LABEL, "input layer must come first"))
            }
            _ => {}
        }
        if self.populations.is_empty() {
            return Err(ConversionError::invalid_layer(layer.name(), "no input layer to connect from"));
        }

        self.sim
            .set_neurons_per_core(CellType::IfCondExp, self.config.simulation.max_neurons_per_core)?;
        let spec = PopulationSpec::new(layer.size(), CellType::IfCondExp, layer.name())
            .with_params(self.config.cell.params.clone())
            .with_structure(layer.structure());
        let id = self.sim.create_population(spec)?;
        self.populations.push(PopulationEntry {
            id,
            label: layer.name().to_string(),
            size: layer.size(),
            shape: layer.output_shape(),
            celltype: CellType::IfCondExp,
            structure: layer.structure(),
            recorded: Vec::new(),
        });
        Ok(Some(id))
    }

    fn check_pair_sizes(&self, name: &str, sources: usize, targets: usize) -> Result<()> {
        let n = self.populations.len();
        let pre = &self.populations[n - 2];
        let post = &self.populations[n - 1];
        if pre.size != sources {
            return Err(ConversionError::shape_mismatch(
                format!("inputs of '{}' (from '{}')", name, pre.label),
                pre.size,
                sources,
            ));
        }
        if post.size != targets {
            return Err(ConversionError::shape_mismatch(format!("outputs of '{}'", name), post.size, targets));
        }
        Ok(())
    }

    fn build_dense(&mut self, layer: &DenseLayer) -> Result<()> {
        if layer.activation == Activation::Softmax {
            self.warn(BuildWarning::SoftmaxSubstituted {
                layer: layer.name.clone(),
            });
        }
        let (rows, cols) = layer.weights.dim();
        self.check_pair_sizes(&layer.name, rows, cols)?;

        let lists = split_weights(&layer.weights, self.config.cell.delay);
        log::info!(
            "Layer '{}': {} excitatory, {} inhibitory connections",
            layer.name,
            lists.excitatory.len(),
            lists.inhibitory.len()
        );
        self.attach_projections(lists)?;
        let biases = layer.biases.to_vec();
        self.apply_biases(&layer.name, &biases)
    }

    fn build_convolution(&mut self, layer: &ConvLayer) -> Result<()> {
        let sources = layer.input_shape.iter().product();
        let targets = layer.output_shape.iter().product();
        self.check_pair_sizes(&layer.name, sources, targets)?;

        let (connections, biases) =
            kernels::build_convolution(layer, self.config.cell.delay, self.config.transpose_kernel());
        let lists = partition_by_sign(connections);
        log::info!(
            "Layer '{}': {} excitatory, {} inhibitory connections",
            layer.name,
            lists.excitatory.len(),
            lists.inhibitory.len()
        );
        self.attach_projections(lists)?;
        self.apply_biases(&layer.name, &biases)
    }

    fn build_pooling(&mut self, layer: &PoolingLayer) -> Result<()> {
        if layer.kind == PoolingKind::Max {
            self.warn(BuildWarning::MaxPoolingFallback {
                layer: layer.name.clone(),
            });
        }
        let sources = layer.input_shape.iter().product();
        let targets = layer.output_shape.iter().product();
        self.check_pair_sizes(&layer.name, sources, targets)?;

        let connections = kernels::build_pooling(layer, self.config.cell.delay);
        log::info!("Layer '{}': {} pooling connections", layer.name, connections.len());
        let n = self.populations.len();
        self.connect(n - 2, n - 1, connections, Receptor::Excitatory)?;
        Ok(())
    }

    fn connect(&mut self, pre: usize, post: usize, connections: Vec<Connection>, receptor: Receptor) -> Result<ProjectionId> {
        let id = self.sim.create_projection(
            self.populations[pre].id,
            self.populations[post].id,
            &connections,
            receptor,
        )?;
        self.projections.push(ProjectionRecord {
            id,
            pre,
            post,
            receptor,
            connections,
        });
        Ok(id)
    }

    fn connect_pair(&mut self, pre: usize, post: usize, lists: ConnectionLists) -> Result<()> {
        self.connect(pre, post, lists.excitatory, Receptor::Excitatory)?;
        self.connect(pre, post, lists.inhibitory, Receptor::Inhibitory)?;
        Ok(())
    }

    /// Excitatory and inhibitory projections into the newest population
    fn attach_projections(&mut self, lists: ConnectionLists) -> Result<()> {
        let n = self.populations.len();
        self.connect_pair(n - 2, n - 1, lists)
    }

    /// Offset currents `bias * dt` on the newest population; all-zero is a no-op
    fn apply_biases(&mut self, layer: &str, biases: &[f64]) -> Result<()> {
        if biases.iter().all(|b| *b == 0.0) {
            return Ok(());
        }
        self.warn(BuildWarning::BiasesApplied {
            layer: layer.to_string(),
        });
        let dt = self.config.simulation.dt;
        let offsets: Vec<f64> = biases.iter().map(|b| b * dt).collect();
        let id = self.populations[self.output_index()].id;
        self.sim.set_offset_currents(id, &offsets)?;
        Ok(())
    }

    /// Apply cell parameters and resting potentials, and start recording.
    ///
    /// Spikes are always recorded on the input and output populations.
    pub fn init_cells(&mut self) -> Result<()> {
        self.require("initialize cells", &[SimState::Built, SimState::Reset])?;
        let vars = self.config.vars_to_record();
        let params = self.config.cell.params.clone();
        let output = self.output_index();

        for (index, entry) in self.populations.iter_mut().enumerate() {
            let mut wanted = if entry.celltype.has_membrane() {
                self.sim.set_cell_params(entry.id, &params)?;
                self.sim.initialize_membrane(entry.id, params.v_rest)?;
                vars.clone()
            } else {
                vec![RecordVar::Spikes]
            };
            if index == output && !wanted.contains(&RecordVar::Spikes) {
                wanted.push(RecordVar::Spikes);
            }
            if !wanted.is_empty() {
                self.sim.record(entry.id, &wanted)?;
            }
            for var in wanted {
                if !entry.recorded.contains(&var) {
                    entry.recorded.push(var);
                }
            }
        }

        self.state = SimState::Initialized;
        log::debug!("Initialized {} populations", self.populations.len());
        Ok(())
    }

    /// Simulate one sample of normalised activations `x`
    pub fn simulate(&mut self, x: &ArrayD<f64>) -> Result<RecordedOutput> {
        self.require(
            "simulate",
            &[SimState::Initialized, SimState::Ran, SimState::Reset],
        )?;
        if !self.config.simulation.poisson_input {
            let feature = match self.config.simulation.dataset_format {
                DatasetFormat::Aedat => "aedat input",
                _ => "constant input currents",
            };
            return Err(ConversionError::not_implemented(feature));
        }

        let input = &self.populations[0];
        if x.len() != input.size {
            return Err(ConversionError::shape_mismatch("input sample", input.size, x.len()));
        }
        let rates: Vec<f64> = x.iter().map(|a| a * POISSON_RATE_SCALE).collect();
        self.sim.set_rates(input.id, &rates)?;

        // The simulator advances in whole steps, so the window does too
        let steps = self.num_timesteps();
        self.sim.run(steps as f64 * self.config.simulation.dt)?;
        self.window_start_step = self.elapsed_steps;
        self.elapsed_steps += steps;
        self.state = SimState::Ran;

        self.recorded_output()
    }

    fn recorded_output(&self) -> Result<RecordedOutput> {
        let input_spiketrains = self.get_spiketrains_input()?;
        let mut layers = Vec::with_capacity(self.populations.len().saturating_sub(1));
        for index in 1..self.populations.len() {
            layers.push(LayerRecording {
                label: self.populations[index].label.clone(),
                spiketrains: self.get_spiketrains(index as isize - 1)?,
                vmem: self.get_vmem(index)?,
            });
        }

        let output = &self.populations[self.output_index()];
        let output_spike_counts = spike_counts(&self.window(self.sim.spiketrains(output.id)?));

        Ok(RecordedOutput {
            input_spiketrains,
            layers,
            output_spike_counts,
        })
    }

    /// Spikes of the current sample window, shifted to start at zero
    fn window(&self, trains: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        let dt = self.config.simulation.dt;
        let steps = self.num_timesteps();
        let start = self.window_start_step as f64 * dt;
        trains
            .into_iter()
            .map(|train| {
                train
                    .into_iter()
                    // Half a step of slack absorbs rounding at the window start
                    .filter(|t| *t - start > -0.5 * dt)
                    .map(|t| (t - start).max(0.0))
                    .filter(|t| spike_index(*t, dt, steps).is_some())
                    .collect()
            })
            .collect()
    }

    fn spiketrains_of(&self, index: usize, shape: Vec<usize>) -> Result<ArrayD<f64>> {
        let trains = self.window(self.sim.spiketrains(self.populations[index].id)?);
        reshape_flattened_spiketrains(&trains, &shape, self.config.simulation.dt)
    }

    fn batch_shape(&self, dims: &[usize], last: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(dims.len() + 2);
        shape.push(self.config.simulation.batch_size);
        shape.extend_from_slice(dims);
        shape.push(last);
        shape
    }

    /// Input spikes as `[batch, input dims..., time]`
    pub fn get_spiketrains_input(&self) -> Result<ArrayD<f64>> {
        let input = self
            .populations
            .first()
            .ok_or(ConversionError::InvalidState {
                operation: "get input spike trains",
                state: self.state,
            })?;
        let shape = self.batch_shape(&input.shape, self.num_timesteps());
        self.spiketrains_of(0, shape)
    }

    /// Spikes of a monitored layer as `[batch, dims..., time]`.
    ///
    /// `monitor_index` counts non-input populations from zero; `-1` selects
    /// the output layer. `None` when the index is out of range or the layer
    /// does not record spikes.
    pub fn get_spiketrains(&self, monitor_index: isize) -> Result<Option<ArrayD<f64>>> {
        let index = if monitor_index == -1 {
            self.output_index()
        } else if monitor_index >= 0 {
            monitor_index as usize + 1
        } else {
            return Ok(None);
        };
        let Some(entry) = self.populations.get(index) else {
            return Ok(None);
        };
        if !entry.records(RecordVar::Spikes) {
            return Ok(None);
        }
        let shape = self.batch_shape(&entry.shape, self.num_timesteps());
        self.spiketrains_of(index, shape).map(Some)
    }

    /// Output spikes as `[batch, classes, time]`
    pub fn get_spiketrains_output(&self) -> Result<ArrayD<f64>> {
        let index = self.output_index();
        let classes = self.populations.get(index).map(|p| p.size).unwrap_or(0);
        let shape = self.batch_shape(&[classes], self.num_timesteps());
        self.spiketrains_of(index, shape)
    }

    /// Membrane potentials of population `layer` as `[batch, dims..., samples]`,
    /// limited to the current sample window. `None` unless `v` is recorded.
    pub fn get_vmem(&self, layer: usize) -> Result<Option<ArrayD<f64>>> {
        let Some(entry) = self.populations.get(layer) else {
            return Ok(None);
        };
        if !entry.records(RecordVar::V) {
            return Ok(None);
        }
        let v = self.sim.membrane_potentials(entry.id)?;
        let start = v.nrows().saturating_sub(self.num_timesteps());
        let window = v.slice(ndarray::s![start.., ..]);
        if window.nrows() == 0 {
            return Ok(None);
        }

        let shape = self.batch_shape(&entry.shape, window.nrows());
        let data: Vec<f64> = window.t().iter().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map(Some)
            .map_err(|_| ConversionError::shape_mismatch(format!("membrane potentials of '{}'", entry.label), entry.size, v.ncols()))
    }

    /// Reset the simulator if `sample_idx` falls on the reset cadence.
    ///
    /// Returns whether a reset happened.
    pub fn reset(&mut self, sample_idx: usize) -> Result<bool> {
        self.require(
            "reset",
            &[SimState::Initialized, SimState::Ran, SimState::Reset],
        )?;
        if !self.config.should_reset(sample_idx) {
            return Ok(false);
        }
        log::info!("Resetting simulator after sample {}", sample_idx);
        self.sim.reset()?;
        self.elapsed_steps = 0;
        self.window_start_step = 0;
        self.state = SimState::Reset;
        Ok(true)
    }

    /// Release the simulator. Terminal.
    pub fn end(&mut self) -> Result<()> {
        if self.state == SimState::Ended {
            return Err(ConversionError::InvalidState {
                operation: "end",
                state: self.state,
            });
        }
        self.sim.end()?;
        self.state = SimState::Ended;
        log::info!("Simulator ended");
        Ok(())
    }

    /// Simulate every sample, resetting on the configured cadence, and
    /// classify each by its most active output neuron
    pub fn run_samples(&mut self, inputs: &[ArrayD<f64>], labels: &[usize]) -> Result<RunSummary> {
        if inputs.len() != labels.len() {
            return Err(ConversionError::shape_mismatch("labels", inputs.len(), labels.len()));
        }
        let mut summary = RunSummary::default();
        for (sample_idx, (x, &label)) in inputs.iter().zip(labels).enumerate() {
            let output = self.simulate(x)?;
            let guess = output.classification();
            if guess == Some(label) {
                summary.correct += 1;
            }
            log::debug!("Sample {}: guess {:?}, label {}", sample_idx, guess, label);
            summary.samples += 1;
            summary.guesses.push(guess);
            summary.spike_counts.push(output.output_spike_counts);
            self.reset(sample_idx)?;
        }
        log::info!(
            "Simulated {} samples, accuracy {:.2}%",
            summary.samples,
            summary.accuracy() * 100.0
        );
        Ok(summary)
    }

    fn should_write<C: ConfirmOverwrite + ?Sized>(&self, path: &Path, confirm: &mut C) -> bool {
        self.config.output.overwrite || !path.exists() || confirm.confirm_overwrite(path)
    }

    /// Save the assembly as `path/filename` and one connection file per
    /// non-input population as `path/<label>`
    pub fn save<C: ConfirmOverwrite + ?Sized>(&self, path: &Path, filename: &str, confirm: &mut C) -> Result<SaveReport> {
        if let Some(entry) = self.populations.iter().skip(1).find(|p| p.label == filename) {
            return Err(ConversionError::invalid_layer(
                entry.label.as_str(),
                "connection file would replace the assembly file",
            ));
        }
        log::info!("Saving model to {}", path.display());
        let assembly = self.save_assembly(path, filename, confirm)?;
        let mut report = SaveReport {
            skipped: if assembly.is_none() { vec![path.join(filename)] } else { Vec::new() },
            assembly,
            ..SaveReport::default()
        };
        for (file, written) in self.save_connections(path, confirm)? {
            if written {
                report.connections.push(file);
            } else {
                report.skipped.push(file);
            }
        }
        Ok(report)
    }

    /// Write the assembly record. `None` when the overwrite was declined.
    pub fn save_assembly<C: ConfirmOverwrite + ?Sized>(
        &self,
        path: &Path,
        filename: &str,
        confirm: &mut C,
    ) -> Result<Option<PathBuf>> {
        self.require(
            "save",
            &[SimState::Built, SimState::Initialized, SimState::Ran, SimState::Reset],
        )?;
        let mut record = AssemblyRecord::new();
        for entry in &self.populations {
            let i_offset = if entry.celltype.has_membrane() {
                Some(self.sim.offset_currents(entry.id)?)
            } else {
                None
            };
            record.push(PopulationRecord {
                size: entry.size,
                structure: entry.structure,
                label: entry.label.clone(),
                celltype: entry.celltype.name().to_string(),
                i_offset,
            })?;
        }

        let file = path.join(filename);
        if !self.should_write(&file, confirm) {
            log::info!("Keeping existing {}", file.display());
            return Ok(None);
        }
        record.save(&file)?;
        Ok(Some(file))
    }

    /// Write one connection file per non-input population, named after it.
    /// Returns each file and whether it was written.
    pub fn save_connections<C: ConfirmOverwrite + ?Sized>(
        &self,
        path: &Path,
        confirm: &mut C,
    ) -> Result<Vec<(PathBuf, bool)>> {
        self.require(
            "save",
            &[SimState::Built, SimState::Initialized, SimState::Ran, SimState::Reset],
        )?;
        let mut files = Vec::with_capacity(self.populations.len().saturating_sub(1));
        for entry in self.populations.iter().skip(1) {
            check_label(&entry.label)?;
        }
        for (post, entry) in self.populations.iter().enumerate().skip(1) {
            let file = path.join(&entry.label);
            if !self.should_write(&file, confirm) {
                log::info!("Keeping existing {}", file.display());
                files.push((file, false));
                continue;
            }
            let connections: Vec<Connection> = self
                .projections
                .iter()
                .filter(|p| p.post == post)
                .flat_map(|p| p.connections.iter().copied())
                .collect();
            write_connection_file(&file, &connections)?;
            files.push((file, true));
        }
        Ok(files)
    }

    /// Rebuild a network saved with [`SpiNNakerSnn::save`].
    ///
    /// Every connection file is read before anything is created; a missing
    /// file fails with [`ConversionError::MissingConnections`].
    pub fn load(&mut self, path: &Path, filename: &str) -> Result<()> {
        self.require("load", &[SimState::Unbuilt])?;
        let record = AssemblyRecord::load(&path.join(filename))?;
        if record.labels.first().map(String::as_str) != Some(INPUT_LABEL) {
            return Err(StorageError::invalid_format("assembly does not start with the input population").into());
        }

        let mut pair_connections = Vec::with_capacity(record.len().saturating_sub(1));
        for label in record.labels.iter().skip(1) {
            check_label(label)?;
            let file = path.join(label);
            if !file.is_file() {
                return Err(ConversionError::MissingConnections { path: file });
            }
        }
        for label in record.labels.iter().skip(1) {
            pair_connections.push(read_connection_file(&path.join(label))?);
        }

        for population in record.iter() {
            let celltype: CellType = population.celltype.parse()?;
            let mut spec = PopulationSpec::new(population.size, celltype, &population.label)
                .with_structure(population.structure);
            if celltype.has_membrane() {
                self.sim
                    .set_neurons_per_core(celltype, self.config.simulation.max_neurons_per_core)?;
                spec = spec.with_params(self.config.cell.params.clone());
            }
            let id = self.sim.create_population(spec)?;
            if let (true, Some(offsets)) = (celltype.has_membrane(), &population.i_offset) {
                self.sim.set_offset_currents(id, offsets)?;
            }
            self.populations.push(PopulationEntry {
                id,
                label: population.label.clone(),
                size: population.size,
                shape: vec![population.size],
                celltype,
                structure: population.structure,
                recorded: Vec::new(),
            });
        }

        for (pre, connections) in pair_connections.into_iter().enumerate() {
            self.connect_pair(pre, pre + 1, partition_by_sign(connections))?;
        }

        self.state = SimState::Built;
        log::info!(
            "Loaded {} populations and {} projections from {}",
            self.populations.len(),
            self.projections.len(),
            path.display()
        );
        Ok(())
    }
}
