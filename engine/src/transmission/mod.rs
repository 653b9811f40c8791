//! Transmission & Transfer Engine
//!
//! Two responsibilities, run in order every Δt:
//!
//! 1. `update_transmission_rates` recomputes each Normal class's per-pathogen
//!    force of infection from current populations, pooled by contact-matrix
//!    row index (mixing group) rather than by class, so classes that mix
//!    together share one denominator.
//! 2. `transfer_class_members` performs one Δt of stochastic member movement
//!    as an explicit work-list fixed point: every marked class samples and
//!    stages its departures, staged members are delivered, and delivery into
//!    a Splitting/ResourceMonitor class re-marks it. The loop drains until no
//!    class is marked, which is required because router classes can cascade
//!    arrivals into further routers within the same Δt.
//!
//! # Critical Invariants
//!
//! 1. Normal classes fire exactly once per Δt, off their start-of-Δt count.
//! 2. Members staged to depart never exceed the class count (sequential
//!    conditional binomial sampling).
//! 3. An empty mixing group contributes zero force of infection (no division
//!    by zero).

use serde::{Deserialize, Serialize};

use crate::models::class::{ClassKind, ProcessKind};
use crate::models::state::TrajectoryState;
use crate::resources;
use crate::rng::RngManager;

/// Per-combination, per-pathogen contact matrices over mixing groups
///
/// Indexed `[combination][pathogen][row][row]`, where the combination index
/// packs the in-effect intervention bits
/// (`TrajectoryState::in_effect_combination_index`). Matrices are precomputed
/// at model build so the per-Δt rate update is a pure lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMatrices {
    num_pathogens: usize,
    num_groups: usize,
    per_combination: Vec<Vec<Vec<Vec<f64>>>>,
}

impl ContactMatrices {
    /// Wrap prebuilt matrices
    ///
    /// # Panics
    /// Panics if any matrix has inconsistent dimensions.
    pub fn new(per_combination: Vec<Vec<Vec<Vec<f64>>>>) -> Self {
        assert!(!per_combination.is_empty(), "at least one combination required");
        let num_pathogens = per_combination[0].len();
        assert!(num_pathogens > 0, "at least one pathogen required");
        let num_groups = per_combination[0][0].len();
        for combo in &per_combination {
            assert_eq!(combo.len(), num_pathogens, "pathogen count mismatch");
            for matrix in combo {
                assert_eq!(matrix.len(), num_groups, "row count mismatch");
                for row in matrix {
                    assert_eq!(row.len(), num_groups, "column count mismatch");
                }
            }
        }
        Self { num_pathogens, num_groups, per_combination }
    }

    /// Identical contact rate for every pair of groups under every combination
    pub fn uniform(
        num_combinations: usize,
        num_pathogens: usize,
        num_groups: usize,
        contact_rate: f64,
    ) -> Self {
        let matrix = vec![vec![contact_rate; num_groups]; num_groups];
        let combo = vec![matrix; num_pathogens];
        Self::new(vec![combo; num_combinations])
    }

    pub fn num_pathogens(&self) -> usize {
        self.num_pathogens
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_combinations(&self) -> usize {
        self.per_combination.len()
    }

    fn matrix(&self, combination: usize, pathogen: usize) -> &Vec<Vec<f64>> {
        &self.per_combination[combination][pathogen]
    }
}

/// Result of one Δt of member transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferResult {
    /// Fixed-point iterations until no class was marked
    pub iterations: usize,
    /// Total members delivered across all classes (cascade hops included)
    pub total_transferred: i64,
}

/// Recompute per-pathogen force of infection for every Normal class
///
/// λ_c[p] = susceptibility_c[p] × Σ_s M[p][row_c][row_s] × infectivity_s[p]
///          × count_s / pop(row_s)
///
/// where the sum runs over Normal source classes and `pop(row)` pools every
/// Normal class in that mixing group.
pub fn update_transmission_rates(state: &mut TrajectoryState, matrices: &ContactMatrices) {
    let combination = state.in_effect_combination_index();
    let num_groups = matrices.num_groups();

    // Pool populations by mixing group, not by class.
    let mut group_pops = vec![0i64; num_groups];
    for class in state.classes() {
        if class.is_normal() {
            group_pops[class.row_index()] += class.count();
        }
    }

    for pathogen in 0..matrices.num_pathogens() {
        let matrix = matrices.matrix(combination, pathogen);

        // Infectious pressure per source group: Σ infectivity × fraction.
        let mut group_pressure = vec![0.0f64; num_groups];
        for class in state.classes() {
            if !class.is_normal() || class.count() == 0 {
                continue;
            }
            let row = class.row_index();
            if group_pops[row] > 0 {
                group_pressure[row] +=
                    class.infectivity(pathogen) * class.count() as f64 / group_pops[row] as f64;
            }
        }

        for id in 0..state.num_classes() {
            if !state.class(id).is_normal() {
                continue;
            }
            let row = state.class(id).row_index();
            let susceptibility = state.class(id).susceptibility(pathogen);
            let mut rate = 0.0;
            if susceptibility != 0.0 {
                for (source_row, &pressure) in group_pressure.iter().enumerate() {
                    rate += matrix[row][source_row] * pressure;
                }
                rate *= susceptibility;
            }
            state.class_mut(id).set_transmission_rate(pathogen, rate);
        }
    }
}

/// Perform one Δt of stochastic member transfer across all classes
///
/// Runs the work-list fixed point described in the module docs. Router
/// cycles are rejected at model build, so the cascade depth is bounded by the
/// number of router classes and the loop always terminates.
pub fn transfer_class_members(
    state: &mut TrajectoryState,
    rng: &mut RngManager,
    delta_t: f64,
) -> TransferResult {
    let num_classes = state.num_classes();

    // Mark every non-empty class as needing processing.
    for id in 0..num_classes {
        let class = state.class_mut(id);
        class.begin_step();
        let marked = class.count() > 0 && !matches!(class.kind(), ClassKind::Death);
        class.set_needs_processing(marked);
    }

    let mut result = TransferResult::default();
    let iteration_cap = num_classes + 2;

    loop {
        // Sampling pass: every marked class stages its departures.
        for id in 0..num_classes {
            if !state.class(id).needs_processing() {
                continue;
            }
            state.class_mut(id).set_needs_processing(false);
            sample_departures(state, id, rng, delta_t);
        }

        // Delivery pass: move staged members, re-marking router destinations.
        let mut delivered_any = false;
        for id in 0..num_classes {
            let staged = state.class_mut(id).take_staged_departures();
            for (destination, members) in staged {
                state.class_mut(destination).receive(members);
                result.total_transferred += members;
                delivered_any = true;
                if state.class(destination).routes_arrivals() {
                    state.class_mut(destination).set_needs_processing(true);
                }
            }
        }

        result.iterations += 1;
        if !delivered_any {
            break;
        }
        debug_assert!(
            result.iterations <= iteration_cap,
            "transfer fixed point exceeded cascade bound"
        );
    }

    result
}

/// Sample and stage departures for one marked class
fn sample_departures(state: &mut TrajectoryState, id: usize, rng: &mut RngManager, delta_t: f64) {
    let count = state.class(id).count();
    if count == 0 {
        return;
    }

    match *state.class(id).kind() {
        ClassKind::Normal => {
            // Competing risks over one Δt: the joint escape probability
            // 1 - exp(-Σrate·Δt) is split across processes in proportion to
            // their rates, so the allocation is independent of declaration
            // order even when individual rate·Δt is large. A process gated
            // on an intervention only competes while it is in effect.
            let mut destinations = Vec::new();
            let mut rates = Vec::new();
            for process in state.class(id).processes() {
                if let Some(iv) = process.activating_intervention {
                    if !state.is_in_effect(iv) {
                        continue;
                    }
                }
                let rate = match process.kind {
                    ProcessKind::RateDriven { rate_param } => state.parameters().value(rate_param),
                    ProcessKind::Infection { pathogen } => state.class(id).transmission_rate(pathogen),
                };
                if rate <= 0.0 {
                    continue;
                }
                destinations.push(process.destination);
                rates.push(rate);
            }
            if rates.is_empty() {
                return;
            }
            let total_rate: f64 = rates.iter().sum();
            let escape = 1.0 - (-total_rate * delta_t).exp();
            let probs: Vec<f64> = rates.iter().map(|r| escape * r / total_rate).collect();
            let departures = rng.multinomial(count, &probs);
            for (destination, members) in destinations.into_iter().zip(departures) {
                state.class_mut(id).stage_departure(destination, members);
            }
        }

        ClassKind::Death => {}

        ClassKind::Splitting { probability_param, primary, secondary } => {
            let p = state.parameters().value(probability_param).clamp(0.0, 1.0);
            let to_primary = rng.binomial(count, p);
            state.class_mut(id).stage_departure(primary, to_primary);
            state.class_mut(id).stage_departure(secondary, count - to_primary);
        }

        ClassKind::ResourceMonitor { resource, units_per_member, served, overflow } => {
            let capacity = resources::available_units(state, resource) / units_per_member;
            let served_members = count.min(capacity.max(0));
            if served_members > 0 {
                // Capacity was computed from availability, so this cannot fail.
                let _consumed = resources::consume(state, resource, served_members * units_per_member);
                debug_assert!(_consumed.is_ok(), "monitor consumed beyond availability");
            }
            state.class_mut(id).stage_departure(served, served_members);
            state.class_mut(id).stage_departure(overflow, count - served_members);
        }
    }
}
