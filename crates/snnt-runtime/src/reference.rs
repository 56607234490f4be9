//! In-process reference backend
//!
//! `ReferenceSimulator` implements [`Simulator`] without external hardware so
//! that converted networks can be dry-run and the conversion layer can be
//! tested. Neuron dynamics are deliberately coarse: Poisson sources fire with
//! probability `rate * dt`, and `IF_cond_exp` cells are approximated by
//! non-leaky integrate-and-fire units (offset current added every step,
//! synaptic weights added on arrival, reset to `v_reset`, refractory period
//! honoured). Conductances and time constants other than `tau_refrac` are not
//! modelled.

use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    cell::{CellParams, CellType},
    error::*,
    simulator::{PopulationId, PopulationInfo, PopulationSpec, ProjectionId, RecordVar, Simulator},
    Connection, Receptor, Structure,
};

#[derive(Debug, Clone)]
struct Population {
    label: String,
    size: usize,
    celltype: CellType,
    structure: Structure,
    /// Present for cells with a membrane
    params: Option<CellParams>,
    i_offset: Vec<f64>,
    v: Vec<f64>,
    v_init: Vec<f64>,
    refractory_until: Vec<f64>,
    rates: Vec<f64>,
    record_spikes: bool,
    record_v: bool,
    spikes: Vec<Vec<f64>>,
    v_samples: Vec<Vec<f64>>,
}

impl Population {
    fn incompatible(&self, operation: &str) -> RuntimeError {
        RuntimeError::IncompatibleCellType {
            label: self.label.clone(),
            celltype: self.celltype.name().to_string(),
            operation: operation.to_string(),
        }
    }

    fn require_membrane(&self, operation: &str) -> Result<()> {
        if self.celltype.has_membrane() {
            Ok(())
        } else {
            Err(self.incompatible(operation))
        }
    }

    fn check_len(&self, what: &str, found: usize) -> Result<()> {
        if found != self.size {
            return Err(RuntimeError::size_mismatch(
                format!("{} of '{}'", what, self.label),
                self.size,
                found,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Projection {
    pre: usize,
    post: usize,
    receptor: Receptor,
    connections: Vec<Connection>,
}

/// Synaptic input waiting for delivery
#[derive(Debug, Clone, Copy)]
struct PendingInput {
    population: usize,
    neuron: usize,
    amount: f64,
}

/// Outgoing synapse of one neuron, resolved for the current timestep
#[derive(Debug, Clone, Copy)]
struct Outgoing {
    population: usize,
    neuron: usize,
    amount: f64,
    delay_steps: u64,
}

/// Time-stepped in-process simulator
#[derive(Debug)]
pub struct ReferenceSimulator {
    dt: Option<f64>,
    populations: Vec<Population>,
    projections: Vec<Projection>,
    neurons_per_core: HashMap<CellType, usize>,
    /// Inputs keyed by the step at which they arrive
    pending: BTreeMap<u64, Vec<PendingInput>>,
    step: u64,
    rng: StdRng,
    ended: bool,
}

impl ReferenceSimulator {
    /// Create a simulator whose Poisson sources are driven by `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            dt: None,
            populations: Vec::new(),
            projections: Vec::new(),
            neurons_per_core: HashMap::new(),
            pending: BTreeMap::new(),
            step: 0,
            rng: StdRng::seed_from_u64(seed),
            ended: false,
        }
    }

    /// Neurons-per-core limit registered for `celltype`
    pub fn neurons_per_core(&self, celltype: CellType) -> Option<usize> {
        self.neurons_per_core.get(&celltype).copied()
    }

    /// Number of populations created so far
    pub fn population_count(&self) -> usize {
        self.populations.len()
    }

    /// Number of projections created so far
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Receptor and connection list of a projection
    pub fn projection_connections(&self, id: ProjectionId) -> Result<(Receptor, &[Connection])> {
        let proj = self
            .projections
            .get(id.raw())
            .ok_or(RuntimeError::ProjectionNotFound { id: id.raw() })?;
        Ok((proj.receptor, &proj.connections))
    }

    /// Whether `end` has been called
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Simulated time since the last reset (ms)
    pub fn current_time(&self) -> f64 {
        self.step as f64 * self.dt.unwrap_or(0.0)
    }

    fn ensure_live(&self) -> Result<f64> {
        if self.ended {
            return Err(RuntimeError::Ended);
        }
        self.dt.ok_or(RuntimeError::NotSetUp)
    }

    fn pop(&self, id: PopulationId) -> Result<&Population> {
        self.ensure_live()?;
        self.populations
            .get(id.raw())
            .ok_or(RuntimeError::PopulationNotFound { id: id.raw() })
    }

    fn pop_mut(&mut self, id: PopulationId) -> Result<&mut Population> {
        self.ensure_live()?;
        self.populations
            .get_mut(id.raw())
            .ok_or(RuntimeError::PopulationNotFound { id: id.raw() })
    }

    /// Index outgoing synapses by `(population, neuron)`
    fn outgoing_index(&self, dt: f64) -> HashMap<(usize, usize), Vec<Outgoing>> {
        let mut index: HashMap<(usize, usize), Vec<Outgoing>> = HashMap::new();
        for proj in &self.projections {
            for conn in &proj.connections {
                let amount = match proj.receptor {
                    Receptor::Excitatory => conn.weight,
                    Receptor::Inhibitory => -conn.weight.abs(),
                };
                let delay_steps = ((conn.delay / dt).round() as u64).max(1);
                index.entry((proj.pre, conn.source)).or_default().push(Outgoing {
                    population: proj.post,
                    neuron: conn.target,
                    amount,
                    delay_steps,
                });
            }
        }
        index
    }
}

impl Simulator for ReferenceSimulator {
    fn setup(&mut self, timestep_ms: f64) -> Result<()> {
        if self.ended {
            return Err(RuntimeError::Ended);
        }
        if timestep_ms <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "timestep",
                timestep_ms.to_string(),
                "> 0.0",
            ));
        }
        self.dt = Some(timestep_ms);
        log::debug!("Reference simulator set up with dt={}ms", timestep_ms);
        Ok(())
    }

    fn timestep(&self) -> f64 {
        self.dt.unwrap_or(0.0)
    }

    fn set_neurons_per_core(&mut self, celltype: CellType, max_neurons: usize) -> Result<()> {
        self.ensure_live()?;
        if max_neurons == 0 {
            return Err(RuntimeError::invalid_parameter("max_neurons", "0", "> 0"));
        }
        self.neurons_per_core.insert(celltype, max_neurons);
        Ok(())
    }

    fn create_population(&mut self, spec: PopulationSpec) -> Result<PopulationId> {
        self.ensure_live()?;
        if spec.size == 0 {
            return Err(RuntimeError::invalid_parameter(
                format!("size of '{}'", spec.label),
                "0",
                "> 0",
            ));
        }

        let params = match (spec.celltype.default_parameters(), spec.params) {
            (Some(_), Some(params)) => Some(params),
            (Some(defaults), None) => Some(defaults),
            (None, None) => None,
            (None, Some(_)) => {
                return Err(RuntimeError::IncompatibleCellType {
                    label: spec.label,
                    celltype: spec.celltype.name().to_string(),
                    operation: "electrical parameters".to_string(),
                })
            }
        };
        if let Some(params) = &params {
            params.validate()?;
        }
        let (i_offset, v_rest) = params
            .as_ref()
            .map(|p| (p.i_offset, p.v_rest))
            .unwrap_or((0.0, 0.0));

        let id = PopulationId::new(self.populations.len());
        log::debug!(
            "Created population '{}' ({} x {})",
            spec.label,
            spec.size,
            spec.celltype
        );
        self.populations.push(Population {
            label: spec.label,
            size: spec.size,
            celltype: spec.celltype,
            structure: spec.structure,
            params,
            i_offset: vec![i_offset; spec.size],
            v: vec![v_rest; spec.size],
            v_init: vec![v_rest; spec.size],
            refractory_until: vec![f64::NEG_INFINITY; spec.size],
            rates: vec![0.0; spec.size],
            record_spikes: false,
            record_v: false,
            spikes: vec![Vec::new(); spec.size],
            v_samples: Vec::new(),
        });
        Ok(id)
    }

    fn population(&self, id: PopulationId) -> Result<PopulationInfo> {
        let pop = self.pop(id)?;
        Ok(PopulationInfo {
            label: pop.label.clone(),
            size: pop.size,
            celltype: pop.celltype,
            structure: pop.structure,
        })
    }

    fn create_projection(
        &mut self,
        pre: PopulationId,
        post: PopulationId,
        connections: &[Connection],
        receptor: Receptor,
    ) -> Result<ProjectionId> {
        let pre_pop = self.pop(pre)?;
        let post_pop = self.pop(post)?;
        for conn in connections {
            if conn.source >= pre_pop.size {
                return Err(RuntimeError::ConnectionOutOfRange {
                    label: pre_pop.label.clone(),
                    index: conn.source,
                    size: pre_pop.size,
                });
            }
            if conn.target >= post_pop.size {
                return Err(RuntimeError::ConnectionOutOfRange {
                    label: post_pop.label.clone(),
                    index: conn.target,
                    size: post_pop.size,
                });
            }
            if conn.delay < 0.0 {
                return Err(RuntimeError::invalid_parameter(
                    "delay",
                    conn.delay.to_string(),
                    ">= 0.0",
                ));
            }
        }
        log::debug!(
            "Projection {} -> {} ({}): {} synapses",
            pre_pop.label,
            post_pop.label,
            receptor.as_str(),
            connections.len()
        );

        let id = ProjectionId::new(self.projections.len());
        self.projections.push(Projection {
            pre: pre.raw(),
            post: post.raw(),
            receptor,
            connections: connections.to_vec(),
        });
        Ok(id)
    }

    fn projection_size(&self, id: ProjectionId) -> Result<usize> {
        self.ensure_live()?;
        self.projection_connections(id).map(|(_, conns)| conns.len())
    }

    fn set_cell_params(&mut self, id: PopulationId, params: &CellParams) -> Result<()> {
        params.validate()?;
        let pop = self.pop_mut(id)?;
        pop.require_membrane("set cell parameters")?;
        pop.params = Some(params.clone());
        Ok(())
    }

    fn set_offset_currents(&mut self, id: PopulationId, offsets: &[f64]) -> Result<()> {
        let pop = self.pop_mut(id)?;
        pop.require_membrane("set offset currents")?;
        pop.check_len("offset currents", offsets.len())?;
        pop.i_offset = offsets.to_vec();
        Ok(())
    }

    fn offset_currents(&self, id: PopulationId) -> Result<Vec<f64>> {
        let pop = self.pop(id)?;
        pop.require_membrane("get offset currents")?;
        Ok(pop.i_offset.clone())
    }

    fn initialize_membrane(&mut self, id: PopulationId, v: f64) -> Result<()> {
        let pop = self.pop_mut(id)?;
        pop.require_membrane("initialize membrane")?;
        pop.v = vec![v; pop.size];
        pop.v_init = vec![v; pop.size];
        Ok(())
    }

    fn set_rates(&mut self, id: PopulationId, rates: &[f64]) -> Result<()> {
        let pop = self.pop_mut(id)?;
        if pop.celltype != CellType::SpikeSourcePoisson {
            return Err(pop.incompatible("set rates"));
        }
        pop.check_len("rates", rates.len())?;
        if let Some(bad) = rates.iter().find(|r| !(**r >= 0.0)) {
            return Err(RuntimeError::invalid_parameter("rate", bad.to_string(), ">= 0.0"));
        }
        pop.rates = rates.to_vec();
        Ok(())
    }

    fn record(&mut self, id: PopulationId, vars: &[RecordVar]) -> Result<()> {
        let pop = self.pop_mut(id)?;
        for var in vars {
            match var {
                RecordVar::Spikes => pop.record_spikes = true,
                RecordVar::V => {
                    pop.require_membrane("record v")?;
                    pop.record_v = true;
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, duration_ms: f64) -> Result<()> {
        let dt = self.ensure_live()?;
        if duration_ms < 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "duration",
                duration_ms.to_string(),
                ">= 0.0",
            ));
        }
        let steps = (duration_ms / dt).round() as u64;
        let outgoing = self.outgoing_index(dt);
        log::debug!("Running reference simulation for {}ms ({} steps)", duration_ms, steps);

        let Self {
            populations,
            pending,
            step,
            rng,
            ..
        } = self;

        for _ in 0..steps {
            let now = *step;
            let t_ms = now as f64 * dt;

            let mut drive: Vec<Vec<f64>> = populations.iter().map(|p| vec![0.0; p.size]).collect();
            for input in pending.remove(&now).unwrap_or_default() {
                drive[input.population][input.neuron] += input.amount;
            }

            for (pi, pop) in populations.iter_mut().enumerate() {
                let mut fired = Vec::new();
                match (pop.celltype, pop.params.as_ref()) {
                    (CellType::SpikeSourcePoisson, _) => {
                        for (n, rate) in pop.rates.iter().enumerate() {
                            if rng.gen::<f64>() < rate * dt / 1000.0 {
                                fired.push(n);
                            }
                        }
                    }
                    (CellType::IfCondExp, Some(params)) => {
                        for n in 0..pop.size {
                            if t_ms < pop.refractory_until[n] {
                                continue;
                            }
                            pop.v[n] += pop.i_offset[n] + drive[pi][n];
                            if pop.v[n] >= params.v_thresh {
                                pop.v[n] = params.v_reset;
                                pop.refractory_until[n] = t_ms + params.tau_refrac;
                                fired.push(n);
                            }
                        }
                        if pop.record_v {
                            pop.v_samples.push(pop.v.clone());
                        }
                    }
                    (CellType::IfCondExp, None) => {}
                }

                for n in fired {
                    if pop.record_spikes {
                        pop.spikes[n].push(t_ms);
                    }
                    for out in outgoing.get(&(pi, n)).into_iter().flatten() {
                        pending.entry(now + out.delay_steps).or_default().push(PendingInput {
                            population: out.population,
                            neuron: out.neuron,
                            amount: out.amount,
                        });
                    }
                }
            }

            *step += 1;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.step = 0;
        self.pending.clear();
        for pop in &mut self.populations {
            pop.v = pop.v_init.clone();
            pop.refractory_until = vec![f64::NEG_INFINITY; pop.size];
            pop.spikes = vec![Vec::new(); pop.size];
            pop.v_samples.clear();
        }
        log::debug!("Reference simulator reset");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.ended {
            return Err(RuntimeError::Ended);
        }
        self.ended = true;
        self.pending.clear();
        log::debug!(
            "Reference simulator ended ({} populations, {} projections)",
            self.populations.len(),
            self.projections.len()
        );
        Ok(())
    }

    fn spiketrains(&self, id: PopulationId) -> Result<Vec<Vec<f64>>> {
        let pop = self.pop(id)?;
        if !pop.record_spikes {
            return Err(RuntimeError::not_recorded(&pop.label, RecordVar::Spikes.name()));
        }
        Ok(pop.spikes.clone())
    }

    fn membrane_potentials(&self, id: PopulationId) -> Result<Array2<f64>> {
        let pop = self.pop(id)?;
        if !pop.record_v {
            return Err(RuntimeError::not_recorded(&pop.label, RecordVar::V.name()));
        }
        let samples = &pop.v_samples;
        Ok(Array2::from_shape_fn((samples.len(), pop.size), |(t, n)| samples[t][n]))
    }
}
