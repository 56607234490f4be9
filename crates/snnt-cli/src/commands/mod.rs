//! CLI command implementations for snnt

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use snnt_compiler::{translate_model, Layer, ModelSpec};

use crate::error::{CliError, CliResult};

pub mod config;
pub mod convert;
pub mod inspect;
pub mod run;

/// snnt - convert trained ANNs into spiking networks for SpiNNaker
#[derive(Parser, Debug)]
#[command(
    name = "snnt",
    version,
    about = "Convert trained ANNs into spiking networks for SpiNNaker",
    long_about = "snnt lowers dense, convolution and pooling layers of a trained network \
                  into pyNN-style populations and projections, saves and reloads the \
                  resulting assembly, and dry-runs it on an in-process reference simulator."
)]
pub struct SnntCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SNNT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a model and save its assembly and connection files
    Convert(convert::ConvertCommand),

    /// Simulate a dataset and report classification accuracy
    Run(run::RunCommand),

    /// Inspect a saved assembly
    Inspect(inspect::InspectCommand),

    /// Create or show the configuration file
    Config(config::ConfigCommand),
}

impl SnntCli {
    /// Execute the CLI command
    pub async fn execute(self) -> CliResult<()> {
        let config = self.config;

        match self.command {
            Commands::Convert(cmd) => cmd.execute(config).await,
            Commands::Run(cmd) => cmd.execute(config).await,
            Commands::Inspect(cmd) => cmd.execute().await,
            Commands::Config(cmd) => cmd.execute(config).await,
        }
    }
}

/// Read a JSON model description and translate it into layers
pub(crate) fn read_model(path: &Path) -> CliResult<Vec<Layer>> {
    if !path.is_file() {
        return Err(CliError::missing_resource(format!("model file {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    let model: ModelSpec = serde_json::from_str(&content)?;
    let layers = translate_model(&model)?;
    tracing::info!("Read {} layers from {}", layers.len(), path.display());
    Ok(layers)
}
