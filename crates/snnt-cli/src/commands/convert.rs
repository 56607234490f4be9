//! Model conversion command

use std::path::{Path, PathBuf};

use clap::Args;
use dialoguer::Confirm;
use snnt_compiler::SpiNNakerSnn;
use snnt_runtime::ReferenceSimulator;
use tracing::{debug, info, warn};

use crate::error::CliResult;

/// Build a model and save its assembly and connection files
#[derive(Args, Debug)]
pub struct ConvertCommand {
    /// JSON model description
    #[arg(short, long)]
    pub model: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub out: PathBuf,

    /// Assembly file name inside the output directory
    #[arg(short, long, default_value = "assembly.bin")]
    pub name: String,

    /// Seed for the reference simulator
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Ask on the terminal before replacing an existing file
pub(crate) fn prompt_overwrite(path: &Path) -> bool {
    Confirm::new()
        .with_prompt(format!("{} exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .unwrap_or(false)
}

impl ConvertCommand {
    pub async fn execute(self, config: Option<PathBuf>) -> CliResult<()> {
        let config = crate::config::resolve(config.as_deref())?;
        let layers = super::read_model(&self.model)?;
        for (name, value) in config.cell.params.named_values() {
            debug!("cell.{} = {}", name, value);
        }

        let mut snn = SpiNNakerSnn::new(ReferenceSimulator::new(self.seed), config)?;
        snn.build(&layers)?;
        for warning in snn.warnings() {
            warn!("{}", warning);
        }

        let report = snn.save(&self.out, &self.name, &mut prompt_overwrite)?;
        if let Some(assembly) = &report.assembly {
            info!("Assembly written to {}", assembly.display());
        }
        info!("{} connection files written", report.connections.len());
        for skipped in &report.skipped {
            info!("Skipped existing {}", skipped.display());
        }

        println!(
            "Converted {} populations, {} projections into {}",
            snn.populations().len(),
            snn.projections().len(),
            self.out.display()
        );
        snn.end()?;
        Ok(())
    }
}
