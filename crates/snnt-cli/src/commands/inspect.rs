//! Assembly inspection command

use std::path::PathBuf;

use clap::Args;
use snnt_storage::{read_connection_file, AssemblyRecord, Receptor};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Inspect a saved assembly
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Assembly file
    #[arg(short, long)]
    pub assembly: PathBuf,

    /// Also summarise the connection files next to the assembly
    #[arg(long)]
    pub connections: bool,
}

impl InspectCommand {
    pub async fn execute(self) -> CliResult<()> {
        info!("Inspecting {}", self.assembly.display());
        let record = AssemblyRecord::load(&self.assembly)?;

        println!("{} populations", record.len());
        println!("{:<20} {:>8}  {:<24} {:<20} {:>8}", "label", "size", "structure", "celltype", "biased");
        for population in record.iter() {
            let biased = population
                .i_offset
                .as_ref()
                .map(|o| o.iter().filter(|v| **v != 0.0).count().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<20} {:>8}  {:<24} {:<20} {:>8}",
                population.label,
                population.size,
                population.structure.to_string(),
                population.celltype,
                biased
            );
        }

        if self.connections {
            let dir = self
                .assembly
                .parent()
                .ok_or_else(|| CliError::invalid_args("assembly path has no parent directory"))?;
            println!();
            for label in record.labels.iter().skip(1) {
                let path = dir.join(label);
                if !path.is_file() {
                    println!("{:<20} missing", label);
                    continue;
                }
                let connections = read_connection_file(&path)?;
                let excitatory = connections
                    .iter()
                    .filter(|c| c.receptor() == Receptor::Excitatory)
                    .count();
                println!(
                    "{:<20} {} connections ({} excitatory, {} inhibitory)",
                    label,
                    connections.len(),
                    excitatory,
                    connections.len() - excitatory
                );
            }
        }
        Ok(())
    }
}
