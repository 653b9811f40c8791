//! Trajectory controller integration tests
//!
//! Full simulations through the public API: determinism, stop conditions,
//! warm-up behavior, calibration rejection and replication aggregation.

use epidemic_simulator_core_rs::models::{
    CalibrationTarget, EpidemicClass, EpidemicEvent, Intervention, InterventionKind, Parameter,
    ParameterSet, Process, Replenishment, Resource, StatSource, SummationStatistic, SwitchingRule,
    TrajectoryState,
};
use epidemic_simulator_core_rs::orchestrator::{
    run_replications, ModelSettings, SimulationError, StopReason, Trajectory,
};
use epidemic_simulator_core_rs::transmission::ContactMatrices;
use epidemic_simulator_core_rs::{EpidemicPolicy, FeatureSnapshot, RngManager};

// ============================================================================
// Test helpers
// ============================================================================

fn sir_state() -> TrajectoryState {
    TrajectoryState::new(
        vec![
            EpidemicClass::normal(0, "S", 980, 0, 1)
                .with_susceptibilities(vec![1.0])
                .with_process(Process::infection(0, 1)),
            EpidemicClass::normal(1, "I", 20, 0, 1)
                .with_infectivities(vec![1.0])
                .with_process(Process::rate_driven(0, 2))
                .with_empty_to_eradicate(),
            EpidemicClass::normal(2, "R", 0, 0, 1),
        ],
        vec![],
        vec![],
        ParameterSet::new(vec![Parameter::constant("gamma", 26.0)]),
        vec![],
        vec![],
    )
}

fn settings() -> ModelSettings {
    ModelSettings {
        delta_t: 1.0 / 52.0,
        indices_per_decision_interval: 4,
        indices_per_observation_period: 4,
        horizon_index: 156,
        base_seed: 2024,
        ..ModelSettings::default()
    }
}

fn sir_trajectory(settings: ModelSettings) -> Trajectory {
    Trajectory::new(sir_state(), ContactMatrices::uniform(1, 1, 1, 78.0), settings).unwrap()
}

// ============================================================================
// Test 1: Bit-identical determinism
// ============================================================================

#[test]
fn test_trajectory_is_bit_identical_per_replication() {
    let mut a = sir_trajectory(settings());
    let mut b = sir_trajectory(settings());

    for replication in 0..3u64 {
        let x = a.simulate(replication);
        let y = b.simulate(replication);
        assert_eq!(x.seed, y.seed);
        assert_eq!(x.final_time_index, y.final_time_index);
        assert_eq!(x.stop_reason, y.stop_reason);
        assert_eq!(x.final_population, y.final_population);
        assert_eq!(x.total_discounted_cost.to_bits(), y.total_discounted_cost.to_bits());
        assert_eq!(x.total_discounted_qaly.to_bits(), y.total_discounted_qaly.to_bits());
        assert_eq!(x.events.events(), y.events.events());
    }
}

#[test]
fn test_rerun_on_same_trajectory_object_matches() {
    // State reuse across simulate calls must not leak between runs.
    let mut trajectory = sir_trajectory(settings());
    let first = trajectory.simulate(7);
    let _ = trajectory.simulate(8);
    let again = trajectory.simulate(7);
    assert_eq!(first.final_population, again.final_population);
    assert_eq!(first.final_time_index, again.final_time_index);
    assert_eq!(first.events.events(), again.events.events());
}

// ============================================================================
// Test 2: Stop conditions
// ============================================================================

#[test]
fn test_horizon_stop() {
    // Zero contact: nothing happens except I draining; with a tiny recovery
    // rate the epidemic outlasts a short horizon.
    let state = TrajectoryState::new(
        vec![
            EpidemicClass::normal(0, "S", 980, 0, 1),
            EpidemicClass::normal(1, "I", 20, 0, 1)
                .with_process(Process::rate_driven(0, 2))
                .with_empty_to_eradicate(),
            EpidemicClass::normal(2, "R", 0, 0, 1),
        ],
        vec![],
        vec![],
        ParameterSet::new(vec![Parameter::constant("gamma", 0.001)]),
        vec![],
        vec![],
    );
    let mut s = settings();
    s.horizon_index = 8;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(1, 1, 1, 0.0), s).unwrap();
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.stop_reason, StopReason::HorizonReached);
    assert_eq!(outcome.final_time_index, 8);
}

#[test]
fn test_eradication_stop_and_event() {
    let mut s = settings();
    s.horizon_index = 10_000;
    let mut trajectory = sir_trajectory(s);
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.stop_reason, StopReason::Eradicated);
    assert!(outcome.final_time_index < 10_000);
    let eradicated_at = outcome
        .events
        .iter()
        .find_map(|e| match e {
            EpidemicEvent::Eradicated { time_index } => Some(*time_index),
            _ => None,
        })
        .unwrap();
    assert_eq!(eradicated_at, outcome.final_time_index);
}

#[test]
fn test_calibration_rejection_short_circuits() {
    // Prevalence of I is capped at 5; 20 initial infected violate at the
    // first observation boundary.
    let state = TrajectoryState::new(
        vec![
            EpidemicClass::normal(0, "S", 980, 0, 1)
                .with_susceptibilities(vec![1.0])
                .with_process(Process::infection(0, 1)),
            EpidemicClass::normal(1, "I", 20, 0, 1)
                .with_infectivities(vec![1.0])
                .with_process(Process::rate_driven(0, 2)),
            EpidemicClass::normal(2, "R", 0, 0, 1),
        ],
        vec![],
        vec![],
        ParameterSet::new(vec![Parameter::constant("gamma", 26.0)]),
        vec![SummationStatistic::new(0, "prev_I", StatSource::Prevalence { classes: vec![1] })
            .with_calibration(CalibrationTarget {
                feasible_min: 0.0,
                feasible_max: 5.0,
                weight: 1.0,
                check_within_feasible_range: true,
            })],
        vec![],
    );
    let mut s = settings();
    s.check_calibration = true;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(1, 1, 1, 78.0), s).unwrap();
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.stop_reason, StopReason::CalibrationInfeasible);
    assert_eq!(outcome.final_time_index, 4, "must stop at the first observation boundary");
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, EpidemicEvent::CalibrationViolated { .. })));
}

#[test]
fn test_simulate_until_accepted_gives_up() {
    // Same infeasible model as above: every attempt is rejected.
    let state = TrajectoryState::new(
        vec![EpidemicClass::normal(0, "I", 20, 0, 1)],
        vec![],
        vec![],
        ParameterSet::default(),
        vec![SummationStatistic::new(0, "prev_I", StatSource::Prevalence { classes: vec![0] })
            .with_calibration(CalibrationTarget {
                feasible_min: 0.0,
                feasible_max: 5.0,
                weight: 1.0,
                check_within_feasible_range: true,
            })],
        vec![],
    );
    let mut s = settings();
    s.check_calibration = true;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(1, 1, 1, 0.0), s).unwrap();
    let err = trajectory.simulate_until_accepted(0, 3).unwrap_err();
    assert!(matches!(err, SimulationError::NoAcceptedTrajectory { attempts: 3 }));
}

// ============================================================================
// Test 3: Warm-up
// ============================================================================

#[test]
fn test_warmup_resets_statistics_and_rewards() {
    let state = TrajectoryState::new(
        vec![
            EpidemicClass::normal(0, "S", 980, 0, 1)
                .with_susceptibilities(vec![1.0])
                .with_process(Process::infection(0, 1)),
            EpidemicClass::normal(1, "I", 20, 0, 1)
                .with_infectivities(vec![1.0])
                .with_cost_per_new_member(100.0),
        ],
        vec![],
        vec![],
        ParameterSet::default(),
        vec![SummationStatistic::new(
            0,
            "cum_inc",
            StatSource::AccumulatingIncidence { classes: vec![1] },
        )],
        vec![],
    );
    let mut s = settings();
    s.warmup_index = 8;
    s.horizon_index = 8;
    s.store_trajectories = true;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(1, 1, 1, 78.0), s).unwrap();
    let outcome = trajectory.simulate(0);

    // The warm-up boundary coincides with the horizon: everything accumulated
    // during warm-up has been wiped.
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, EpidemicEvent::WarmupEnded { time_index: 8 })));
    assert_eq!(outcome.total_discounted_cost, 0.0);
    let last_stats = outcome.history.stat_values().last().unwrap();
    assert_eq!(last_stats[0], 0.0, "accumulating incidence must restart at warm-up");
}

// ============================================================================
// Test 4: History gating
// ============================================================================

#[test]
fn test_history_disabled_by_default() {
    let mut trajectory = sir_trajectory(settings());
    let outcome = trajectory.simulate(0);
    assert!(outcome.history.is_empty());
}

#[test]
fn test_history_rows_when_enabled() {
    let mut s = settings();
    s.store_trajectories = true;
    s.horizon_index = 20;
    let mut trajectory = sir_trajectory(s);
    let outcome = trajectory.simulate(0);
    // One row per Δt plus the initial state at index 0.
    assert_eq!(outcome.history.len(), outcome.final_time_index + 1);
    assert_eq!(outcome.history.class_counts()[0], vec![980, 20, 0]);
    // Every row carries one count per class.
    for row in outcome.history.class_counts() {
        assert_eq!(row.len(), 3);
        assert_eq!(row.iter().sum::<i64>(), 1000);
    }
}

// ============================================================================
// Test 5: Resource replenishment inside a trajectory
// ============================================================================

#[test]
fn test_replenishment_event_emitted() {
    let state = TrajectoryState::new(
        vec![EpidemicClass::normal(0, "S", 100, 0, 1)],
        vec![],
        vec![Resource::new(
            0,
            "doses",
            0,
            Some(Replenishment::OneTime { time_param: 0, amount_param: 1 }),
        )],
        ParameterSet::new(vec![
            Parameter::constant("arrival", 3.0),
            Parameter::constant("amount", 500.0),
        ]),
        vec![],
        vec![],
    );
    let mut s = settings();
    s.horizon_index = 8;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(1, 1, 1, 0.0), s).unwrap();
    let outcome = trajectory.simulate(0);
    let delivery = outcome
        .events
        .iter()
        .find_map(|e| match e {
            EpidemicEvent::ResourceReplenished { time_index, resource, amount } => {
                Some((*time_index, *resource, *amount))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(delivery, (3, 0, 500));
}

// ============================================================================
// Test 6: Replications
// ============================================================================

#[test]
fn test_run_replications_deterministic_summary() {
    let mut a = sir_trajectory(settings());
    let mut b = sir_trajectory(settings());
    let (_, summary_a) = run_replications(&mut a, 10, 5).unwrap();
    let (_, summary_b) = run_replications(&mut b, 10, 5).unwrap();
    assert_eq!(summary_a, summary_b);
    assert_eq!(summary_a.num_replications, 10);
}

// ============================================================================
// Test 7: Settings from JSON
// ============================================================================

#[test]
fn test_settings_deserialize_from_json() {
    let json = r#"{
        "delta_t": 0.019230769230769232,
        "indices_per_decision_interval": 4,
        "indices_per_observation_period": 4,
        "horizon_index": 52,
        "base_seed": 99,
        "objective": { "NetMonetaryBenefit": { "wtp": 30000.0 } }
    }"#;
    let parsed: ModelSettings = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.horizon_index, 52);
    assert_eq!(parsed.base_seed, 99);
    // Omitted fields take defaults.
    assert_eq!(parsed.warmup_index, 0);
    assert!(!parsed.store_trajectories);

    let mut trajectory =
        Trajectory::new(sir_state(), ContactMatrices::uniform(1, 1, 1, 78.0), parsed).unwrap();
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.seed, 99);
}

#[test]
fn test_intervention_costs_flow_into_outcome() {
    // A predetermined-on intervention with a fixed and per-period cost.
    let state = TrajectoryState::new(
        vec![EpidemicClass::normal(0, "S", 100, 0, 1)],
        vec![
            Intervention::new(
                0,
                "program",
                InterventionKind::Additive,
                SwitchingRule::Predetermined { value: true },
            )
            .with_costs(1000.0, 10.0, 0.0),
        ],
        vec![],
        ParameterSet::default(),
        vec![],
        vec![],
    );
    let mut s = settings();
    s.horizon_index = 8; // two decision intervals of 4 indices
    s.annual_discount_rate = 0.0;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(2, 1, 1, 0.0), s).unwrap();
    let outcome = trajectory.simulate(0);
    // Fixed cost once, per-period cost at each of the two decision points.
    assert_eq!(outcome.total_discounted_cost, 1000.0 + 2.0 * 10.0);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, EpidemicEvent::DecisionAnnounced { time_index: 0, .. })));
}

#[test]
fn test_nonzero_discount_rate_per_interval_factors() {
    let state = TrajectoryState::new(
        vec![EpidemicClass::normal(0, "S", 100, 0, 1)],
        vec![
            Intervention::new(
                0,
                "program",
                InterventionKind::Additive,
                SwitchingRule::Predetermined { value: true },
            )
            .with_costs(0.0, 100.0, 0.0),
        ],
        vec![],
        ParameterSet::default(),
        vec![],
        vec![],
    );
    let mut s = settings();
    s.horizon_index = 8; // two decision intervals of 4 indices
    s.annual_discount_rate = 0.1;
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(2, 1, 1, 0.0), s).unwrap();
    let outcome = trajectory.simulate(0);

    // Per-period cost lands once in interval 0 (undiscounted) and once in
    // interval 1 (one factor); stopping on the boundary must not discount
    // the last interval any deeper.
    let factor = 1.0 / (1.1f64).powf(4.0 / 52.0);
    let expected = 100.0 + 100.0 * factor;
    assert!(
        (outcome.total_discounted_cost - expected).abs() < 1e-9,
        "discounted cost {} differs from expected {}",
        outcome.total_discounted_cost,
        expected
    );
}

// ============================================================================
// Test 8: External policy through the trajectory
// ============================================================================

/// Picks the feasible combination with the most interventions on
struct AllOnPolicy;

impl EpidemicPolicy for AllOnPolicy {
    fn choose_combination(
        &mut self,
        _features: &FeatureSnapshot,
        feasible: &[Vec<bool>],
        _rng: &mut RngManager,
    ) -> usize {
        let mut best = 0;
        let mut best_on = -1i32;
        for (i, combo) in feasible.iter().enumerate() {
            let on = combo.iter().filter(|&&b| b).count() as i32;
            if on > best_on {
                best_on = on;
                best = i;
            }
        }
        best
    }
}

#[test]
fn test_attached_policy_drives_dynamic_intervention() {
    let state = TrajectoryState::new(
        vec![EpidemicClass::normal(0, "S", 100, 0, 1)],
        vec![
            Intervention::new(0, "lever", InterventionKind::Additive, SwitchingRule::Dynamic)
                .with_costs(500.0, 10.0, 0.0),
        ],
        vec![],
        ParameterSet::default(),
        vec![],
        vec![],
    );
    let mut s = settings();
    s.horizon_index = 8;
    let mut trajectory = Trajectory::new(state, ContactMatrices::uniform(2, 1, 1, 0.0), s)
        .unwrap()
        .with_policy(Box::new(AllOnPolicy));
    let outcome = trajectory.simulate(0);

    // The policy turns the lever on at the first decision point: fixed cost
    // once, per-period cost at both decision points.
    assert_eq!(outcome.total_discounted_cost, 500.0 + 2.0 * 10.0);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, EpidemicEvent::DecisionAnnounced { time_index: 0, .. })));
}

// ============================================================================
// Test 9: Intervention-gated processes
// ============================================================================

fn gated_state(rule: SwitchingRule) -> TrajectoryState {
    TrajectoryState::new(
        vec![
            EpidemicClass::normal(0, "waiting", 100, 0, 1)
                .with_process(Process::rate_driven(0, 1).activated_by(0)),
            EpidemicClass::normal(1, "treated", 0, 0, 1),
        ],
        vec![Intervention::new(0, "treatment", InterventionKind::Additive, rule)],
        vec![],
        ParameterSet::new(vec![Parameter::constant("treat_rate", 1e9)]),
        vec![],
        vec![],
    )
}

#[test]
fn test_process_gated_on_intervention_in_effect() {
    let mut s = settings();
    s.horizon_index = 4;
    s.store_trajectories = true;

    // Intervention stays off: nobody moves despite the enormous rate.
    let state = gated_state(SwitchingRule::Predetermined { value: false });
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(2, 1, 1, 0.0), s.clone()).unwrap();
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.history.class_counts().last().unwrap(), &vec![100, 0]);

    // Intervention on from the first decision point: everyone is treated.
    let state = gated_state(SwitchingRule::Predetermined { value: true });
    let mut trajectory =
        Trajectory::new(state, ContactMatrices::uniform(2, 1, 1, 0.0), s).unwrap();
    let outcome = trajectory.simulate(0);
    assert_eq!(outcome.history.class_counts().last().unwrap(), &vec![0, 100]);
}
