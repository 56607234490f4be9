#![doc = "ANN-to-SNN lowering for pyNN-style targets.\n\nPublic responsibilities:\n- Layer model: a closed `Layer` enum translated once from any `SourceLayer` (dense, convolution, pooling, flatten, input)\n- Connection lists: weight splitting into excitatory/inhibitory lists, convolution and pooling kernels flattened into connection lists\n- Configuration: cell parameters, timing, reset cadence, overwrite policy, recorded variables\n- Target driver: `SpiNNakerSnn`, which builds populations and projections on a `Simulator`, initialises cells, runs samples, resets, ends, and saves/loads assemblies\n\nIntegration points:\n- snnt-runtime: the `Simulator` trait and `ReferenceSimulator`\n- snnt-storage: assembly records and connection list files\n- snnt-cli: `convert`, `run` and `inspect` commands\n"]

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connections;
pub mod error;
pub mod kernels;
pub mod layer;
pub mod spiketrains;
pub mod target;

pub use config::{DatasetFormat, KerasBackend, SimulationConfig};
pub use connections::{partition_by_sign, split_weights, ConnectionLists};
pub use error::{ConversionError, Result};
pub use layer::{
    translate_model, Activation, ConvLayer, DenseLayer, Layer, LayerSpec, ModelSpec, Padding,
    PoolingKind, PoolingLayer, SourceLayer, TensorSpec,
};
pub use target::{
    BuildWarning, ConfirmOverwrite, LayerRecording, PopulationEntry, ProjectionRecord,
    RecordedOutput, RunSummary, SaveReport, SimState, SpiNNakerSnn, POISSON_RATE_SCALE,
};
