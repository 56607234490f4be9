//! Reshaping recorded spike trains into dense tensors

use ndarray::{ArrayD, IxDyn};

use crate::error::{ConversionError, Result};

/// Fraction of a step below a boundary still counted in the next step
const STEP_TOLERANCE: f64 = 1e-9;

/// Scatter per-neuron spike times into a dense tensor of `shape`.
///
/// The last axis is time in steps of `dt`; all leading axes together index
/// neurons in row-major order. For neuron `k` spiking at `t`, element
/// `[k, floor(t / dt)]` is set to `t`. Spikes beyond the last step are dropped.
pub fn reshape_flattened_spiketrains(trains: &[Vec<f64>], shape: &[usize], dt: f64) -> Result<ArrayD<f64>> {
    let (&num_steps, leading) = shape
        .split_last()
        .ok_or_else(|| ConversionError::shape_mismatch("spike train tensor", 1, 0))?;
    let num_neurons: usize = leading.iter().product();
    if trains.len() != num_neurons {
        return Err(ConversionError::shape_mismatch("spike trains", num_neurons, trains.len()));
    }

    let mut flat = vec![0.0; num_neurons * num_steps];
    for (k, train) in trains.iter().enumerate() {
        for &t in train {
            if let Some(step) = spike_index(t, dt, num_steps) {
                flat[k * num_steps + step] = t;
            }
        }
    }

    ArrayD::from_shape_vec(IxDyn(shape), flat)
        .map_err(|_| ConversionError::shape_mismatch("spike train tensor", num_neurons * num_steps, 0))
}

/// Time step a spike at `t` falls into, if inside the window.
///
/// Spike times sit on multiples of `dt`; a small tolerance keeps a time
/// that lands just below a step boundary in that step.
pub fn spike_index(t: f64, dt: f64, num_steps: usize) -> Option<usize> {
    if !(t >= 0.0) || !(dt > 0.0) {
        return None;
    }
    let step = (t / dt + STEP_TOLERANCE).floor() as usize;
    (step < num_steps).then_some(step)
}

/// Count spikes per neuron
pub fn spike_counts(trains: &[Vec<f64>]) -> Vec<usize> {
    trains.iter().map(Vec::len).collect()
}
