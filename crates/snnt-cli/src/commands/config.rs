//! Configuration file commands

use std::path::PathBuf;

use clap::{Args, Subcommand};
use snnt_compiler::SimulationConfig;
use tracing::info;

use crate::config::{default_config_path, resolve, save_to_file};
use crate::error::{CliError, CliResult};

/// Create or show the configuration file
#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

impl ConfigCommand {
    pub async fn execute(self, config: Option<PathBuf>) -> CliResult<()> {
        match self.action {
            ConfigAction::Init { force } => {
                let path = match config {
                    Some(path) => path,
                    None => default_config_path()?,
                };
                if path.exists() && !force {
                    return Err(CliError::invalid_args(format!(
                        "{} already exists (use --force to replace it)",
                        path.display()
                    )));
                }
                save_to_file(&SimulationConfig::default(), &path)?;
                info!("Wrote default configuration");
                println!("{}", path.display());
            }
            ConfigAction::Show => {
                let effective = resolve(config.as_deref())?;
                let text = toml::to_string_pretty(&effective)
                    .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;
                print!("{}", text);
            }
        }
        Ok(())
    }
}
