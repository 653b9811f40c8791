//! Decision Engine
//!
//! At each decision point the engine evaluates every intervention's switching
//! rule, assembles a new announced combination, and charges switching costs.
//! Interventions with static rules are resolved independently by scanning the
//! on value first, then off; dynamically controlled interventions are resolved
//! jointly: the full dynamic sub-space is pruned to combinations compatible
//! with all static constraints, and the external policy collaborator picks
//! among the survivors.
//!
//! Announced decisions and in-effect decisions are distinct: a turn-on only
//! takes effect after the intervention's activation delay, so
//! `implement_pending` runs every Δt to mature announced decisions.

use crate::models::intervention::{InterventionId, RuleContext, SwitchingRule};
use crate::models::record::{EpidemicEvent, EventLog};
use crate::models::state::TrajectoryState;
use crate::outcomes::CostHealthAccumulator;
use crate::rng::RngManager;

/// Scalar features exposed to the external policy collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSnapshot {
    /// Current time index
    pub time_index: usize,
    /// Epidemic time in years
    pub epidemic_time: f64,
    /// Available units per resource
    pub resource_levels: Vec<i64>,
    /// Observed (surveillance-delayed) summation statistic readings; a
    /// statistic with no observation yet reads 0.0
    pub statistic_readings: Vec<f64>,
    /// Announced on/off value per intervention
    pub announced: Vec<bool>,
    /// Whether each intervention has ever been employed
    pub ever_used: Vec<bool>,
}

impl FeatureSnapshot {
    pub fn from_state(state: &TrajectoryState, time_index: usize, epidemic_time: f64) -> Self {
        Self {
            time_index,
            epidemic_time,
            resource_levels: state.resources().iter().map(|r| r.available_units()).collect(),
            statistic_readings: state
                .summation_stats()
                .iter()
                .map(|s| s.observed().unwrap_or(0.0))
                .collect(),
            announced: state.announced_combination().to_vec(),
            ever_used: state.interventions().iter().map(|iv| iv.ever_turned_on()).collect(),
        }
    }
}

/// External policy collaborator for dynamically controlled interventions
///
/// Synchronous call/return contract: the engine passes current features and
/// the feasible combinations, the policy returns the index of its choice
/// (greedy or epsilon-greedy via the trajectory RNG), and each decision
/// interval it receives the realized reward for backpropagation.
pub trait EpidemicPolicy {
    /// Pick one of `feasible` (guaranteed non-empty); returns an index into it
    fn choose_combination(
        &mut self,
        features: &FeatureSnapshot,
        feasible: &[Vec<bool>],
        rng: &mut RngManager,
    ) -> usize;

    /// Realized discounted reward for one decision interval
    fn receive_reward(&mut self, decision_interval: usize, reward: f64) {
        let _ = (decision_interval, reward);
    }
}

/// Keeps the previously announced value for every dynamic intervention
///
/// The default collaborator when no learning policy is attached.
#[derive(Debug, Default, Clone)]
pub struct StatusQuoPolicy;

impl EpidemicPolicy for StatusQuoPolicy {
    fn choose_combination(
        &mut self,
        features: &FeatureSnapshot,
        feasible: &[Vec<bool>],
        _rng: &mut RngManager,
    ) -> usize {
        feasible
            .iter()
            .position(|combo| *combo == features.announced)
            .unwrap_or(0)
    }
}

/// Per-trajectory decision bookkeeping
#[derive(Debug)]
pub struct DecisionEngine {
    /// Ids of dynamically controlled interventions (fixed per model)
    dynamic_ids: Vec<InterventionId>,
    /// Scratch buffer reused across decision points
    candidate: Vec<bool>,
}

impl DecisionEngine {
    pub fn new(state: &TrajectoryState) -> Self {
        let dynamic_ids = state
            .interventions()
            .iter()
            .filter(|iv| iv.is_dynamic())
            .map(|iv| iv.id())
            .collect();
        Self {
            dynamic_ids,
            candidate: vec![false; state.num_interventions()],
        }
    }

    fn rule_context(state: &TrajectoryState, id: InterventionId, time_index: usize) -> RuleContext {
        let iv = state.intervention(id);
        let observed_value = match iv.rule() {
            SwitchingRule::ThresholdBased { statistic, .. } => state.observed_stat(*statistic),
            _ => None,
        };
        let resource_units = match iv.required_resource() {
            Some(resource) => state.resource(resource).available_units(),
            None => i64::MAX,
        };
        RuleContext {
            time_index,
            currently_on: state.is_announced_on(id),
            observed_value,
            resource_units,
        }
    }

    /// Evaluate all rules and announce a (possibly unchanged) combination
    ///
    /// Must only be called at decision points. Charges fixed/penalty switching
    /// costs for changed interventions and the per-period cost of every
    /// intervention announced on, then schedules delayed activations.
    pub fn make_and_announce_decisions(
        &mut self,
        state: &mut TrajectoryState,
        time_index: usize,
        epidemic_time: f64,
        policy: &mut dyn EpidemicPolicy,
        rng: &mut RngManager,
        accumulator: &mut CostHealthAccumulator,
        log: &mut EventLog,
    ) {
        let num = state.num_interventions();

        // Static interventions resolve independently: scan on, then off.
        for id in 0..num {
            if state.intervention(id).is_dynamic() {
                continue;
            }
            let ctx = Self::rule_context(state, id, time_index);
            let iv = state.intervention(id);
            self.candidate[id] = if iv.is_feasible(true, &ctx) {
                true
            } else if iv.is_feasible(false, &ctx) {
                false
            } else {
                // Rules always admit at least one value; keep the previous
                // announcement if a context ever degenerates.
                ctx.currently_on
            };
        }

        // Dynamic interventions resolve jointly over the pruned sub-space.
        if !self.dynamic_ids.is_empty() {
            let feasible = self.feasible_dynamic_combinations(state, time_index);
            if feasible.is_empty() {
                // No compatible combination: dynamic levers keep their value.
                for &id in &self.dynamic_ids {
                    self.candidate[id] = state.is_announced_on(id);
                }
            } else {
                let features = FeatureSnapshot::from_state(state, time_index, epidemic_time);
                let index = policy.choose_combination(&features, &feasible, rng);
                let chosen = &feasible[index.min(feasible.len() - 1)];
                for &id in &self.dynamic_ids {
                    self.candidate[id] = chosen[id];
                }
            }
        }

        // Apply the announcement, charging switching costs on every change.
        let mut changed = false;
        for id in 0..num {
            let was_on = state.is_announced_on(id);
            let now_on = self.candidate[id];
            if was_on != now_on {
                changed = true;
                if now_on {
                    accumulator.add_intervention_cost(state.intervention(id).fixed_cost());
                    state.interventions_mut()[id].record_turn_on(time_index);
                } else {
                    accumulator.add_intervention_cost(state.intervention(id).penalty_cost());
                    state.interventions_mut()[id].record_turn_off(time_index);
                }
                state.set_announced(id, now_on);
            }
            if now_on {
                accumulator.add_intervention_cost(state.intervention(id).cost_per_decision_period());
            }
        }

        if changed {
            log.log(EpidemicEvent::DecisionAnnounced {
                time_index,
                combination: state.announced_combination().to_vec(),
            });
        }
    }

    /// Enumerate dynamic on/off assignments compatible with every constraint
    ///
    /// Returns one candidate per surviving assignment, each a full-length
    /// combination over all interventions (static values already fixed).
    fn feasible_dynamic_combinations(
        &self,
        state: &TrajectoryState,
        time_index: usize,
    ) -> Vec<Vec<bool>> {
        let k = self.dynamic_ids.len();
        let mut feasible = Vec::new();
        for assignment in 0..(1usize << k) {
            let mut combo = self.candidate.clone();
            for (slot, &id) in self.dynamic_ids.iter().enumerate() {
                combo[id] = assignment & (1 << slot) != 0;
            }
            let ok = self.dynamic_ids.iter().all(|&id| {
                let ctx = Self::rule_context(state, id, time_index);
                state.intervention(id).is_feasible(combo[id], &ctx)
            });
            if ok {
                feasible.push(combo);
            }
        }
        feasible
    }

    /// Apply announced decisions whose activation delay has elapsed
    ///
    /// Runs every Δt. Turn-offs apply immediately; turn-ons apply once the
    /// pending effect index is reached.
    pub fn implement_pending(
        &mut self,
        state: &mut TrajectoryState,
        time_index: usize,
        log: &mut EventLog,
    ) {
        for id in 0..state.num_interventions() {
            let announced = state.is_announced_on(id);
            let in_effect = state.is_in_effect(id);

            if !announced && in_effect {
                state.set_in_effect(id, false);
                log.log(EpidemicEvent::DecisionInEffect { time_index, intervention: id, on: false });
            } else if announced && !in_effect {
                let matured = match state.intervention(id).pending_effect_index() {
                    Some(effect_index) => time_index >= effect_index,
                    // No pending record (e.g. Default at trajectory start).
                    None => true,
                };
                if matured {
                    state.set_in_effect(id, true);
                    state.interventions_mut()[id].clear_pending_effect();
                    log.log(EpidemicEvent::DecisionInEffect {
                        time_index,
                        intervention: id,
                        on: true,
                    });
                }
            }
        }
    }
}
