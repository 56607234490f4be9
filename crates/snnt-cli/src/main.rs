//! # snnt - ANN to SNN conversion for SpiNNaker targets
//!
//! Converts trained networks into spiking populations and projections,
//! saves and reloads assemblies, and dry-runs them on the reference
//! simulator.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snnt_cli::{error::CliResult, SnntCli};

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = SnntCli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute().await {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
