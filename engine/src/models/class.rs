//! Population compartments ("classes")
//!
//! A class holds a non-negative integer member count plus the outgoing
//! processes that move members to other classes. Four kinds exist:
//!
//! - **Normal**: participates in transmission and multi-process departure
//! - **Death**: terminal sink, members only accumulate
//! - **Splitting**: deterministic fork on a Bernoulli draw into two destinations
//! - **ResourceMonitor**: fork based on resource availability at arrival
//!
//! # Critical Invariants
//!
//! 1. Members leaving a class in one Δt never exceed its count at the start
//!    of that Δt (sequential binomial sampling enforces this).
//! 2. A class's outgoing flows are resolved before its incoming flows are
//!    applied in the same transfer pass (departures are staged, then delivered).

use serde::{Deserialize, Serialize};

use crate::models::intervention::InterventionId;
use crate::models::parameter::ParamId;
use crate::models::resource::ResourceId;

/// Index of a class within the trajectory state
pub type ClassId = usize;

/// What drives an outgoing process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Departure at a parameterized rate (per year); the per-Δt departure
    /// probability is `1 - exp(-rate × Δt)`
    RateDriven { rate_param: ParamId },

    /// Departure driven by the class's current force of infection for one
    /// pathogen (recomputed every Δt from the contact structure)
    Infection { pathogen: usize },
}

/// An outgoing process of a Normal class
///
/// Each process has exactly one destination. A process with an activating
/// intervention only fires while that intervention is in effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub kind: ProcessKind,
    pub destination: ClassId,
    pub activating_intervention: Option<InterventionId>,
}

impl Process {
    pub fn rate_driven(rate_param: ParamId, destination: ClassId) -> Self {
        Self {
            kind: ProcessKind::RateDriven { rate_param },
            destination,
            activating_intervention: None,
        }
    }

    pub fn infection(pathogen: usize, destination: ClassId) -> Self {
        Self {
            kind: ProcessKind::Infection { pathogen },
            destination,
            activating_intervention: None,
        }
    }

    /// Gate this process on an intervention being in effect
    pub fn activated_by(mut self, intervention: InterventionId) -> Self {
        self.activating_intervention = Some(intervention);
        self
    }
}

/// Kind-specific payload of a class
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ClassKind {
    /// Ordinary compartment with outgoing processes
    Normal,

    /// Terminal sink; arrivals accumulate and never leave
    Death,

    /// Instantaneous router: each arrival goes to `primary` with the
    /// parameterized probability, otherwise to `secondary`
    Splitting {
        probability_param: ParamId,
        primary: ClassId,
        secondary: ClassId,
    },

    /// Instantaneous router keyed on resource availability at arrival:
    /// arrivals are served (consuming `units_per_member`) while units last,
    /// the remainder overflows
    ResourceMonitor {
        resource: ResourceId,
        units_per_member: i64,
        served: ClassId,
        overflow: ClassId,
    },
}

/// A population compartment
///
/// # Example
/// ```
/// use epidemic_simulator_core_rs::models::{EpidemicClass, Process};
///
/// // Susceptible class of 999 members in mixing group 0, one pathogen
/// let s = EpidemicClass::normal(0, "S", 999, 0, 1)
///     .with_susceptibilities(vec![1.0])
///     .with_process(Process::infection(0, 1));
/// assert_eq!(s.count(), 999);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpidemicClass {
    id: ClassId,
    name: String,
    kind: ClassKind,
    /// Member count at trajectory start (the reset target)
    initial_count: i64,
    /// Current member count
    count: i64,
    /// Per-pathogen susceptibility (Normal classes only)
    susceptibilities: Vec<f64>,
    /// Per-pathogen infectivity (Normal classes only)
    infectivities: Vec<f64>,
    /// Row index into the contact-matrix mixing-group structure
    row_index: usize,
    /// Whether eradication requires this class to be empty
    empty_to_eradicate: bool,
    /// One-time cost charged per new member arriving here
    cost_per_new_member: f64,
    /// QALY weight per member per year of residence
    health_quality_weight: f64,
    /// Outgoing processes (Normal classes only); ownership is exclusive
    processes: Vec<Process>,

    // Mutable per-Δt state, reset between trajectories
    /// Per-pathogen force of infection recomputed each Δt
    transmission_rates: Vec<f64>,
    /// Departures staged this pass: (destination, members)
    staged_departures: Vec<(ClassId, i64)>,
    /// Members delivered to this class during the current Δt
    arrivals_this_step: i64,
    /// Cumulative arrivals since the last statistics reset
    arrivals_accumulated: i64,
    /// Work-list mark for the fixed-point transfer loop
    needs_processing: bool,
}

impl EpidemicClass {
    fn base(
        id: ClassId,
        name: impl Into<String>,
        kind: ClassKind,
        initial_count: i64,
        row_index: usize,
        num_pathogens: usize,
    ) -> Self {
        assert!(initial_count >= 0, "initial_count must be non-negative");
        Self {
            id,
            name: name.into(),
            kind,
            initial_count,
            count: initial_count,
            susceptibilities: vec![0.0; num_pathogens],
            infectivities: vec![0.0; num_pathogens],
            row_index,
            empty_to_eradicate: false,
            cost_per_new_member: 0.0,
            health_quality_weight: 0.0,
            processes: Vec::new(),
            transmission_rates: vec![0.0; num_pathogens],
            staged_departures: Vec::new(),
            arrivals_this_step: 0,
            arrivals_accumulated: 0,
            needs_processing: false,
        }
    }

    /// Create a Normal compartment
    pub fn normal(
        id: ClassId,
        name: impl Into<String>,
        initial_count: i64,
        row_index: usize,
        num_pathogens: usize,
    ) -> Self {
        Self::base(id, name, ClassKind::Normal, initial_count, row_index, num_pathogens)
    }

    /// Create a Death sink
    pub fn death(id: ClassId, name: impl Into<String>, num_pathogens: usize) -> Self {
        Self::base(id, name, ClassKind::Death, 0, 0, num_pathogens)
    }

    /// Create a Splitting router
    pub fn splitting(
        id: ClassId,
        name: impl Into<String>,
        probability_param: ParamId,
        primary: ClassId,
        secondary: ClassId,
        num_pathogens: usize,
    ) -> Self {
        Self::base(
            id,
            name,
            ClassKind::Splitting { probability_param, primary, secondary },
            0,
            0,
            num_pathogens,
        )
    }

    /// Create a ResourceMonitor router
    pub fn resource_monitor(
        id: ClassId,
        name: impl Into<String>,
        resource: ResourceId,
        units_per_member: i64,
        served: ClassId,
        overflow: ClassId,
        num_pathogens: usize,
    ) -> Self {
        assert!(units_per_member > 0, "units_per_member must be positive");
        Self::base(
            id,
            name,
            ClassKind::ResourceMonitor { resource, units_per_member, served, overflow },
            0,
            0,
            num_pathogens,
        )
    }

    pub fn with_susceptibilities(mut self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.susceptibilities.len(), "pathogen count mismatch");
        self.susceptibilities = values;
        self
    }

    pub fn with_infectivities(mut self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.infectivities.len(), "pathogen count mismatch");
        self.infectivities = values;
        self
    }

    pub fn with_process(mut self, process: Process) -> Self {
        assert!(
            matches!(self.kind, ClassKind::Normal),
            "only Normal classes own outgoing processes"
        );
        self.processes.push(process);
        self
    }

    pub fn with_empty_to_eradicate(mut self) -> Self {
        self.empty_to_eradicate = true;
        self
    }

    pub fn with_cost_per_new_member(mut self, cost: f64) -> Self {
        self.cost_per_new_member = cost;
        self
    }

    pub fn with_health_quality_weight(mut self, weight: f64) -> Self {
        self.health_quality_weight = weight;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn empty_to_eradicate(&self) -> bool {
        self.empty_to_eradicate
    }

    pub fn cost_per_new_member(&self) -> f64 {
        self.cost_per_new_member
    }

    pub fn health_quality_weight(&self) -> f64 {
        self.health_quality_weight
    }

    pub fn susceptibility(&self, pathogen: usize) -> f64 {
        self.susceptibilities[pathogen]
    }

    pub fn infectivity(&self, pathogen: usize) -> f64 {
        self.infectivities[pathogen]
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn transmission_rate(&self, pathogen: usize) -> f64 {
        self.transmission_rates[pathogen]
    }

    pub fn arrivals_this_step(&self) -> i64 {
        self.arrivals_this_step
    }

    pub fn arrivals_accumulated(&self) -> i64 {
        self.arrivals_accumulated
    }

    pub fn needs_processing(&self) -> bool {
        self.needs_processing
    }

    /// Whether this class mixes and is infectable/infectious
    pub fn is_normal(&self) -> bool {
        matches!(self.kind, ClassKind::Normal)
    }

    /// Whether arrivals are forwarded within the same Δt
    pub fn routes_arrivals(&self) -> bool {
        matches!(
            self.kind,
            ClassKind::Splitting { .. } | ClassKind::ResourceMonitor { .. }
        )
    }

    // ========================================================================
    // Per-Δt mutation (driven by the transmission/transfer engine)
    // ========================================================================

    pub(crate) fn set_transmission_rate(&mut self, pathogen: usize, rate: f64) {
        self.transmission_rates[pathogen] = rate;
    }

    pub(crate) fn set_needs_processing(&mut self, flag: bool) {
        self.needs_processing = flag;
    }

    /// Stage `members` to depart toward `destination`; debits the count now so
    /// outgoing flows are resolved before any incoming flow is applied
    pub(crate) fn stage_departure(&mut self, destination: ClassId, members: i64) {
        debug_assert!(members >= 0 && members <= self.count);
        if members > 0 {
            self.count -= members;
            self.staged_departures.push((destination, members));
        }
    }

    pub(crate) fn take_staged_departures(&mut self) -> Vec<(ClassId, i64)> {
        std::mem::take(&mut self.staged_departures)
    }

    /// Deliver members that departed another class this pass
    pub(crate) fn receive(&mut self, members: i64) {
        debug_assert!(members >= 0);
        self.count += members;
        self.arrivals_this_step += members;
        self.arrivals_accumulated += members;
    }

    /// Clear the per-Δt arrival counter (start of each transfer step)
    pub(crate) fn begin_step(&mut self) {
        self.arrivals_this_step = 0;
    }

    /// Zero the accumulating arrival counter (warm-up / trajectory reset)
    pub(crate) fn reset_accumulated_arrivals(&mut self) {
        self.arrivals_accumulated = 0;
    }

    /// Restore to pre-trajectory state without touching topology
    pub fn reset(&mut self) {
        self.count = self.initial_count;
        self.transmission_rates.iter_mut().for_each(|r| *r = 0.0);
        self.staged_departures.clear();
        self.arrivals_this_step = 0;
        self.arrivals_accumulated = 0;
        self.needs_processing = false;
    }
}
