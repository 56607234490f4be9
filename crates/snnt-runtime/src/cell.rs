//! Cell types and electrical parameters

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::*;

/// Neuron models the conversion layer instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// Poisson spike source, used for the input layer
    SpikeSourcePoisson,
    /// Integrate-and-fire neuron with exponential conductance synapses
    IfCondExp,
}

impl CellType {
    /// pyNN name of the cell type
    pub const fn name(&self) -> &'static str {
        match self {
            CellType::SpikeSourcePoisson => "SpikeSourcePoisson",
            CellType::IfCondExp => "IF_cond_exp",
        }
    }

    /// Whether neurons of this type have a membrane potential
    pub const fn has_membrane(&self) -> bool {
        matches!(self, CellType::IfCondExp)
    }

    /// Simulator default parameters, if the type takes electrical parameters
    pub fn default_parameters(&self) -> Option<CellParams> {
        match self {
            CellType::SpikeSourcePoisson => None,
            CellType::IfCondExp => Some(CellParams {
                v_thresh: -50.0,
                v_reset: -65.0,
                v_rest: -65.0,
                e_rev_e: 0.0,
                e_rev_i: -70.0,
                cm: 1.0,
                i_offset: 0.0,
                tau_refrac: 0.1,
                tau_m: 20.0,
                tau_syn_e: 5.0,
                tau_syn_i: 5.0,
            }),
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SpikeSourcePoisson" => Ok(CellType::SpikeSourcePoisson),
            "IF_cond_exp" => Ok(CellType::IfCondExp),
            other => Err(RuntimeError::UnknownCellType {
                name: other.to_string(),
            }),
        }
    }
}

/// Electrical parameters of an `IF_cond_exp` cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellParams {
    /// Spike threshold (mV)
    pub v_thresh: f64,
    /// Reset potential after a spike (mV)
    pub v_reset: f64,
    /// Resting potential (mV)
    pub v_rest: f64,
    /// Excitatory reversal potential (mV)
    #[serde(rename = "e_rev_E")]
    pub e_rev_e: f64,
    /// Inhibitory reversal potential (mV)
    #[serde(rename = "e_rev_I")]
    pub e_rev_i: f64,
    /// Membrane capacitance (nF)
    pub cm: f64,
    /// Constant offset current (nA)
    pub i_offset: f64,
    /// Refractory period (ms)
    pub tau_refrac: f64,
    /// Membrane time constant (ms)
    pub tau_m: f64,
    /// Excitatory synaptic time constant (ms)
    #[serde(rename = "tau_syn_E")]
    pub tau_syn_e: f64,
    /// Inhibitory synaptic time constant (ms)
    #[serde(rename = "tau_syn_I")]
    pub tau_syn_i: f64,
}

impl Default for CellParams {
    /// Parameters suited to rate-coded conversion: threshold at 1, reset and
    /// rest at 0, a very slow leak.
    fn default() -> Self {
        Self {
            v_thresh: 1.0,
            v_reset: 0.0,
            v_rest: 0.0,
            e_rev_e: 10.0,
            e_rev_i: -10.0,
            cm: 0.09,
            i_offset: 0.0,
            tau_refrac: 0.0,
            tau_m: 1000.0,
            tau_syn_e: 0.01,
            tau_syn_i: 0.01,
        }
    }
}

impl CellParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.cm <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "cm",
                self.cm.to_string(),
                "> 0.0",
            ));
        }
        if self.tau_m <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "tau_m",
                self.tau_m.to_string(),
                "> 0.0",
            ));
        }
        if self.tau_refrac < 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "tau_refrac",
                self.tau_refrac.to_string(),
                ">= 0.0",
            ));
        }
        if self.tau_syn_e <= 0.0 || self.tau_syn_i <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "tau_syn",
                format!("E={}, I={}", self.tau_syn_e, self.tau_syn_i),
                "> 0.0",
            ));
        }
        if self.v_thresh <= self.v_reset {
            return Err(RuntimeError::invalid_parameter(
                "v_thresh",
                format!("{} (with v_reset={})", self.v_thresh, self.v_reset),
                "> v_reset",
            ));
        }
        Ok(())
    }

    /// Parameter names in pyNN spelling, paired with their values
    pub fn named_values(&self) -> [(&'static str, f64); 11] {
        [
            ("v_thresh", self.v_thresh),
            ("v_reset", self.v_reset),
            ("v_rest", self.v_rest),
            ("e_rev_E", self.e_rev_e),
            ("e_rev_I", self.e_rev_i),
            ("cm", self.cm),
            ("i_offset", self.i_offset),
            ("tau_refrac", self.tau_refrac),
            ("tau_m", self.tau_m),
            ("tau_syn_E", self.tau_syn_e),
            ("tau_syn_I", self.tau_syn_i),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_type_names_roundtrip() {
        for celltype in [CellType::SpikeSourcePoisson, CellType::IfCondExp] {
            assert_eq!(celltype.name().parse::<CellType>().unwrap(), celltype);
        }
        assert!(matches!(
            "IF_curr_alpha".parse::<CellType>(),
            Err(RuntimeError::UnknownCellType { .. })
        ));
    }

    #[test]
    fn test_default_parameters() {
        assert!(CellType::SpikeSourcePoisson.default_parameters().is_none());
        let params = CellType::IfCondExp.default_parameters().unwrap();
        assert!(params.validate().is_ok());
        assert!(CellParams::default().validate().is_ok());
    }

    #[test]
    fn test_params_validation() {
        let mut params = CellParams::default();
        params.cm = 0.0;
        assert!(params.validate().is_err());

        let mut params = CellParams::default();
        params.v_thresh = params.v_reset;
        assert!(params.validate().is_err());

        let mut params = CellParams::default();
        params.tau_refrac = -1.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_named_values_use_pynn_spelling() {
        let names: Vec<&str> = CellParams::default().named_values().iter().map(|(n, _)| *n).collect();
        assert!(names.contains(&"tau_syn_E"));
        assert!(names.contains(&"e_rev_I"));
        assert_eq!(names.len(), 11);
    }
}
