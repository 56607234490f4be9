//! snnt CLI crate
//!
//! Public responsibilities (library view):
//! - Re-export the primary CLI entry (SnntCli) for the binary and for tests.
//! - Expose the command modules so they can be invoked programmatically.
//!
//! Commands (see [commands]):
//! - convert: JSON model → populations/projections on the reference simulator → assembly + connection files.
//! - run: build or load a network, simulate a JSON dataset with periodic reset, report accuracy.
//! - inspect: print the populations of a saved assembly and summarise its connection files.
//! - config: write or print the TOML configuration.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::SnntCli;
