//! Statistics & reward accumulation
//!
//! Per-Δt statistic updates (summations strictly before ratios), observation
//! period bookkeeping with calibration range checks, and the cost/health
//! accumulator that turns class flows and intervention spending into a
//! discounted reward stream for the decision policy.

use serde::{Deserialize, Serialize};

use crate::models::record::{EpidemicEvent, EventLog};
use crate::models::state::TrajectoryState;

/// How cost and health accumulate into a scalar reward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// wtp × ΔQALY − ΔCost
    NetMonetaryBenefit { wtp: f64 },
    /// ΔQALY − ΔCost / wtp
    NetHealthBenefit { wtp: f64 },
}

impl Objective {
    pub fn reward(&self, delta_cost: f64, delta_qaly: f64) -> f64 {
        match *self {
            Objective::NetMonetaryBenefit { wtp } => wtp * delta_qaly - delta_cost,
            Objective::NetHealthBenefit { wtp } => delta_qaly - delta_cost / wtp,
        }
    }
}

/// Recompute every statistic for the current Δt
///
/// Ratio statistics read the summation values computed in the same call, so
/// the two passes must not be interleaved.
pub fn update_statistics(state: &mut TrajectoryState) {
    let (classes, summations, ratios) = state.split_stats_mut();
    for stat in summations.iter_mut() {
        stat.update(classes);
    }
    for ratio in ratios.iter_mut() {
        ratio.update(summations);
    }
}

/// Close the current observation period on every statistic
///
/// Returns the name and value of the first calibration violation, if any.
/// Sentinel ratio readings (undefined denominator) never violate; the range
/// check is skipped for that period.
pub fn close_observation_period(
    state: &mut TrajectoryState,
    time_index: usize,
    check_calibration: bool,
    log: &mut EventLog,
) -> Option<(String, f64)> {
    let (_, summations, ratios) = state.split_stats_mut();
    for stat in summations.iter_mut() {
        stat.close_period();
    }
    for ratio in ratios.iter_mut() {
        ratio.close_period(summations);
    }

    if !check_calibration {
        return None;
    }

    let mut violation: Option<(String, f64)> = None;
    for stat in state.summation_stats() {
        if let (Some(target), Some(value)) = (stat.calibration(), stat.last_recorded()) {
            if target.check_within_feasible_range && !target.contains(value) {
                violation = Some((stat.name().to_string(), value));
                break;
            }
        }
    }
    if violation.is_none() {
        for ratio in state.ratio_stats() {
            if let (Some(target), Some(value)) = (ratio.calibration(), ratio.last_recorded()) {
                if value == crate::models::statistics::RATIO_UNDEFINED {
                    continue;
                }
                if target.check_within_feasible_range && !target.contains(value) {
                    violation = Some((ratio.name().to_string(), value));
                    break;
                }
            }
        }
    }

    if let Some((ref name, value)) = violation {
        log.log(EpidemicEvent::CalibrationViolated {
            time_index,
            statistic_name: name.clone(),
            value,
        });
    }
    violation
}

/// Accumulates cost and health within one decision interval
///
/// Flows accumulate undiscounted within the interval; the trajectory
/// controller flushes at each decision point, applying the discount factor for
/// the number of elapsed intervals, and forwards the resulting reward to the
/// policy.
#[derive(Debug, Clone, Default)]
pub struct CostHealthAccumulator {
    period_cost: f64,
    period_qaly: f64,
    total_discounted_cost: f64,
    total_discounted_qaly: f64,
}

impl CostHealthAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cost accumulated since the last flush
    pub fn period_cost(&self) -> f64 {
        self.period_cost
    }

    /// QALYs accumulated since the last flush
    pub fn period_qaly(&self) -> f64 {
        self.period_qaly
    }

    /// Discounted cost over the whole trajectory so far
    pub fn total_discounted_cost(&self) -> f64 {
        self.total_discounted_cost
    }

    /// Discounted QALYs over the whole trajectory so far
    pub fn total_discounted_qaly(&self) -> f64 {
        self.total_discounted_qaly
    }

    /// Charge an intervention switching or maintenance cost
    pub fn add_intervention_cost(&mut self, cost: f64) {
        self.period_cost += cost;
    }

    /// Accrue per-Δt class flows: arrival costs and quality-weighted
    /// person-time
    pub fn accrue_step(&mut self, state: &TrajectoryState, delta_t: f64) {
        for class in state.classes() {
            let cost = class.cost_per_new_member();
            if cost != 0.0 {
                self.period_cost += cost * class.arrivals_this_step() as f64;
            }
            let weight = class.health_quality_weight();
            if weight != 0.0 {
                self.period_qaly += weight * class.count() as f64 * delta_t;
            }
        }
    }

    /// Close the current decision interval
    ///
    /// `discount_factor` is the per-interval factor already raised to the
    /// number of elapsed intervals. Returns the discounted reward under the
    /// objective and zeroes the interval accumulators.
    pub fn flush_interval(&mut self, objective: Objective, discount_factor: f64) -> f64 {
        let cost = self.period_cost * discount_factor;
        let qaly = self.period_qaly * discount_factor;
        self.total_discounted_cost += cost;
        self.total_discounted_qaly += qaly;
        self.period_cost = 0.0;
        self.period_qaly = 0.0;
        objective.reward(cost, qaly)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::class::EpidemicClass;
    use crate::models::parameter::ParameterSet;
    use crate::models::statistics::{
        CalibrationTarget, RatioKind, RatioStatistic, StatSource, SummationStatistic,
        RATIO_UNDEFINED,
    };

    fn stats_state() -> TrajectoryState {
        TrajectoryState::new(
            vec![
                EpidemicClass::normal(0, "S", 90, 0, 1),
                EpidemicClass::normal(1, "I", 10, 0, 1),
            ],
            vec![],
            vec![],
            ParameterSet::default(),
            vec![
                SummationStatistic::new(0, "prev_I", StatSource::Prevalence { classes: vec![1] }),
                SummationStatistic::new(1, "inc_I", StatSource::Incidence { classes: vec![1] }),
            ],
            vec![RatioStatistic::new(0, "inc_over_prev", 1, 0, RatioKind::CurrentOverCurrent)],
        )
    }

    #[test]
    fn test_update_order_summations_then_ratios() {
        let mut state = stats_state();
        state.class_mut(1).begin_step();
        state.class_mut(1).receive(5);
        update_statistics(&mut state);
        assert_eq!(state.summation_stats()[0].current_value(), 15.0);
        assert_eq!(state.summation_stats()[1].current_value(), 5.0);
        assert_eq!(state.ratio_stats()[0].current_value(), 5.0 / 15.0);
    }

    #[test]
    fn test_calibration_violation_detected() {
        let mut state = TrajectoryState::new(
            vec![EpidemicClass::normal(0, "I", 500, 0, 1)],
            vec![],
            vec![],
            ParameterSet::default(),
            vec![SummationStatistic::new(
                0,
                "prev_I",
                StatSource::Prevalence { classes: vec![0] },
            )
            .with_calibration(CalibrationTarget {
                feasible_min: 0.0,
                feasible_max: 100.0,
                weight: 1.0,
                check_within_feasible_range: true,
            })],
            vec![],
        );
        let mut log = EventLog::new();
        update_statistics(&mut state);
        let violation = close_observation_period(&mut state, 4, true, &mut log);
        assert_eq!(violation, Some(("prev_I".to_string(), 500.0)));
        assert_eq!(log.len(), 1);

        // Same reading passes when checking is off (full-factorial mode).
        let mut state2 = stats_state();
        update_statistics(&mut state2);
        assert!(close_observation_period(&mut state2, 4, false, &mut log).is_none());
    }

    #[test]
    fn test_sentinel_ratio_skips_calibration() {
        let mut state = TrajectoryState::new(
            vec![
                EpidemicClass::normal(0, "num", 10, 0, 1),
                EpidemicClass::normal(1, "den", 0, 0, 1),
            ],
            vec![],
            vec![],
            ParameterSet::default(),
            vec![
                SummationStatistic::new(0, "n", StatSource::Prevalence { classes: vec![0] }),
                SummationStatistic::new(1, "d", StatSource::Prevalence { classes: vec![1] }),
            ],
            vec![RatioStatistic::new(0, "r", 0, 1, RatioKind::CurrentOverCurrent)
                .with_calibration(CalibrationTarget {
                    feasible_min: 0.0,
                    feasible_max: 1.0,
                    weight: 1.0,
                    check_within_feasible_range: true,
                })],
        );
        let mut log = EventLog::new();
        update_statistics(&mut state);
        assert_eq!(state.ratio_stats()[0].current_value(), RATIO_UNDEFINED);
        assert!(close_observation_period(&mut state, 0, true, &mut log).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_accumulator_costs_and_qalys() {
        let mut state = TrajectoryState::new(
            vec![
                EpidemicClass::normal(0, "Well", 100, 0, 1).with_health_quality_weight(1.0),
                EpidemicClass::normal(1, "Hosp", 0, 0, 1)
                    .with_cost_per_new_member(1000.0)
                    .with_health_quality_weight(0.5),
            ],
            vec![],
            vec![],
            ParameterSet::default(),
            vec![],
            vec![],
        );
        state.class_mut(1).begin_step();
        state.class_mut(1).receive(2);

        let mut acc = CostHealthAccumulator::new();
        let delta_t = 1.0 / 52.0;
        acc.accrue_step(&state, delta_t);
        assert_eq!(acc.period_cost(), 2000.0);
        let expected_qaly = (100.0 + 0.5 * 2.0) * delta_t;
        assert!((acc.period_qaly() - expected_qaly).abs() < 1e-12);
    }

    #[test]
    fn test_flush_discounts_and_zeroes() {
        let mut acc = CostHealthAccumulator::new();
        acc.add_intervention_cost(100.0);
        acc.period_qaly = 2.0;

        let objective = Objective::NetMonetaryBenefit { wtp: 50_000.0 };
        let reward = acc.flush_interval(objective, 0.5);
        assert_eq!(reward, 50_000.0 * 1.0 - 50.0);
        assert_eq!(acc.period_cost(), 0.0);
        assert_eq!(acc.period_qaly(), 0.0);
        assert_eq!(acc.total_discounted_cost(), 50.0);
        assert_eq!(acc.total_discounted_qaly(), 1.0);
    }

    #[test]
    fn test_net_health_benefit() {
        let objective = Objective::NetHealthBenefit { wtp: 50_000.0 };
        assert_eq!(objective.reward(100_000.0, 5.0), 5.0 - 2.0);
    }
}
