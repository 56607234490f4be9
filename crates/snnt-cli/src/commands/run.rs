//! Dataset simulation command

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use snnt_compiler::SpiNNakerSnn;
use snnt_runtime::ReferenceSimulator;
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};

/// Simulate a dataset and report classification accuracy
#[derive(Args, Debug)]
pub struct RunCommand {
    /// JSON model description
    #[arg(short, long, required_unless_present = "assembly", conflicts_with = "assembly")]
    pub model: Option<PathBuf>,

    /// Directory holding a saved assembly and its connection files
    #[arg(short, long)]
    pub assembly: Option<PathBuf>,

    /// Assembly file name inside the assembly directory
    #[arg(short, long, default_value = "assembly.bin")]
    pub name: String,

    /// JSON dataset: {"samples": [[...], ...], "labels": [...]}
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Seed for the reference simulator
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Rate-code inputs as Poisson spike sources (overrides the config)
    #[arg(long)]
    pub poisson: bool,

    /// Write per-sample results as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Samples with their labels
#[derive(Debug, Deserialize)]
pub struct Dataset {
    /// Flattened normalised activations, one entry per sample
    pub samples: Vec<Vec<f64>>,
    /// Class label per sample
    pub labels: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct SampleResult {
    label: usize,
    guess: Option<usize>,
    spike_counts: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    samples: usize,
    correct: usize,
    accuracy: f64,
    results: Vec<SampleResult>,
}

impl RunCommand {
    pub async fn execute(self, config: Option<PathBuf>) -> CliResult<()> {
        let mut config = crate::config::resolve(config.as_deref())?;
        if self.poisson {
            config.simulation.poisson_input = true;
        }

        let dataset = self.read_dataset()?;
        let mut snn = SpiNNakerSnn::new(ReferenceSimulator::new(self.seed), config)?;
        match (&self.model, &self.assembly) {
            (Some(model), _) => {
                let layers = super::read_model(model)?;
                snn.build(&layers)?;
            }
            (None, Some(dir)) => snn.load(dir, &self.name)?,
            (None, None) => return Err(CliError::invalid_args("either --model or --assembly is required")),
        }
        for warning in snn.warnings() {
            warn!("{}", warning);
        }
        debug!(
            "Reference simulator holds {} populations and {} projections",
            snn.simulator().population_count(),
            snn.simulator().projection_count()
        );
        snn.init_cells()?;

        let inputs: Vec<ArrayD<f64>> = dataset
            .samples
            .iter()
            .map(|s| ArrayD::from_shape_vec(IxDyn(&[s.len()]), s.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| CliError::invalid_args(format!("malformed sample: {}", e)))?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| anyhow::anyhow!(e))?,
        );
        spinner.set_message(format!("Simulating {} samples", inputs.len()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        let summary = snn.run_samples(&inputs, &dataset.labels);
        spinner.finish_and_clear();
        let summary = summary?;
        snn.end()?;

        println!(
            "Accuracy: {:.2}% ({}/{})",
            summary.accuracy() * 100.0,
            summary.correct,
            summary.samples
        );

        if let Some(path) = &self.output {
            let results = dataset
                .labels
                .iter()
                .zip(summary.guesses.iter().zip(summary.spike_counts.iter()))
                .map(|(&label, (&guess, counts))| SampleResult {
                    label,
                    guess,
                    spike_counts: counts.clone(),
                })
                .collect();
            let report = RunReport {
                samples: summary.samples,
                correct: summary.correct,
                accuracy: summary.accuracy(),
                results,
            };
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
            info!("Results written to {}", path.display());
        }
        Ok(())
    }

    fn read_dataset(&self) -> CliResult<Dataset> {
        if !self.dataset.is_file() {
            return Err(CliError::missing_resource(format!(
                "dataset {}",
                self.dataset.display()
            )));
        }
        let dataset: Dataset = serde_json::from_str(&std::fs::read_to_string(&self.dataset)?)?;
        if dataset.samples.len() != dataset.labels.len() {
            return Err(CliError::invalid_args(format!(
                "dataset has {} samples but {} labels",
                dataset.samples.len(),
                dataset.labels.len()
            )));
        }
        Ok(dataset)
    }
}
