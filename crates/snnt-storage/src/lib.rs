//! Persistence layer and shared primitives for snnt
//!
//! This crate owns the types that cross every other layer of the workspace
//! (connection tuples, receptor kinds, population structures) together with
//! the two on-disk formats produced when a converted network is saved:
//!
//! - the assembly record, a bincode-encoded map of population descriptors
//! - one connection list file per adjacent population pair, in the
//!   whitespace separated list layout used by pyNN's file connector

#![deny(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

pub mod assembly;
pub mod connections;
pub mod error;

pub use assembly::{AssemblyRecord, PopulationRecord, ASSEMBLY_VARIABLES};
pub use connections::{read_connection_file, write_connection_file, CONNECTION_COLUMNS};
pub use error::{Result, StorageError};

/// Label reserved for the input population of every assembly
pub const INPUT_LABEL: &str = "InputLayer";

/// A single synapse between two adjacent populations.
///
/// Indices are zero-based and local to the source and target populations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Index of the presynaptic neuron
    pub source: usize,
    /// Index of the postsynaptic neuron
    pub target: usize,
    /// Signed synaptic weight
    pub weight: f64,
    /// Synaptic delay (ms)
    pub delay: f64,
}

impl Connection {
    /// Create a new connection
    pub const fn new(source: usize, target: usize, weight: f64, delay: f64) -> Self {
        Self {
            source,
            target,
            weight,
            delay,
        }
    }

    /// Tuple view `(source, target, weight, delay)`
    pub const fn as_tuple(&self) -> (usize, usize, f64, f64) {
        (self.source, self.target, self.weight, self.delay)
    }

    /// Receptor this connection is routed to, decided by weight sign
    pub fn receptor(&self) -> Receptor {
        if self.weight >= 0.0 {
            Receptor::Excitatory
        } else {
            Receptor::Inhibitory
        }
    }
}

impl From<(usize, usize, f64, f64)> for Connection {
    fn from((source, target, weight, delay): (usize, usize, f64, f64)) -> Self {
        Self::new(source, target, weight, delay)
    }
}

/// Synaptic receptor a projection targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Receptor {
    /// Non-negative weights
    Excitatory,
    /// Negative weights
    Inhibitory,
}

impl Receptor {
    /// Receptor type name as understood by pyNN
    pub const fn as_str(&self) -> &'static str {
        match self {
            Receptor::Excitatory => "excitatory",
            Receptor::Inhibitory => "inhibitory",
        }
    }
}

/// Spatial arrangement of the neurons of a population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Structure {
    /// Neurons on a line (pyNN default)
    Line,
    /// Neurons on a two dimensional grid
    Grid2D {
        /// Width divided by height
        aspect_ratio: f64,
    },
}

impl Default for Structure {
    fn default() -> Self {
        Structure::Line
    }
}

impl std::fmt::Display for Structure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Structure::Line => write!(f, "Line"),
            Structure::Grid2D { aspect_ratio } => write!(f, "Grid2D(aspect_ratio={})", aspect_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_receptor_by_sign() {
        assert_eq!(Connection::new(0, 0, 0.5, 1.0).receptor(), Receptor::Excitatory);
        assert_eq!(Connection::new(0, 0, 0.0, 1.0).receptor(), Receptor::Excitatory);
        assert_eq!(Connection::new(0, 0, -0.1, 1.0).receptor(), Receptor::Inhibitory);
    }

    #[test]
    fn test_connection_tuple_conversion() {
        let conn: Connection = (1, 2, -0.2, 1.0).into();
        assert_eq!(conn.as_tuple(), (1, 2, -0.2, 1.0));
    }

    #[test]
    fn test_structure_display() {
        assert_eq!(Structure::default().to_string(), "Line");
        assert_eq!(
            Structure::Grid2D { aspect_ratio: 2.0 }.to_string(),
            "Grid2D(aspect_ratio=2)"
        );
    }
}
