//! Trajectory engine
//!
//! Main step loop integrating all components:
//! - Decision making and delayed implementation (announced vs in-effect)
//! - Parameter advancement and resource replenishment
//! - Transmission rate update and stochastic member transfer
//! - Statistics, observation periods and calibration checks
//! - Cost/health accrual and per-interval reward flushing
//!
//! # Architecture
//!
//! ```text
//! For each time index t:
//! 1.  Apply due resource replenishments
//! 2.  At a decision point: flush the completed interval's reward to the
//!     policy, then evaluate switching rules and announce a combination
//! 3.  Mature announced decisions whose activation delay has elapsed
//! 4.  Advance time-dependent parameters
//! 5.  Recompute per-pathogen transmission rates
//! 6.  Transfer members (fixed-point cascade over routers)
//! 7.  Update statistics (summations, then ratios)
//! 8.  Accrue cost and quality-weighted person-time
//! 9.  At an observation boundary: close the period, check calibration
//! 10. At the warm-up boundary: reset statistics and accumulators
//! 11. Record history, check eradication, advance time
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use epidemic_simulator_core_rs::orchestrator::{ModelSettings, Trajectory};
//!
//! let mut trajectory = Trajectory::new(state, matrices, settings)?;
//! let outcome = trajectory.simulate(0)?;
//! println!("stopped at {} because {:?}", outcome.final_time_index, outcome.stop_reason);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::time::SimClock;
use crate::decision::{DecisionEngine, EpidemicPolicy, StatusQuoPolicy};
use crate::models::class::{ClassKind, ProcessKind};
use crate::models::intervention::{InterventionKind, SwitchingRule};
use crate::models::record::{EpidemicEvent, EventLog, TrajectoryHistory};
use crate::models::resource::Replenishment;
use crate::models::state::TrajectoryState;
use crate::outcomes::{self, CostHealthAccumulator, Objective};
use crate::rng::RngManager;
use crate::transmission::{self, ContactMatrices};

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete trajectory configuration
///
/// All timing fields are whole numbers of Δt indices. Deserializable so
/// frontends can ship settings as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Length of one Δt in years
    pub delta_t: f64,

    /// Δt indices between decision points
    pub indices_per_decision_interval: usize,

    /// Δt indices in one observation period
    pub indices_per_observation_period: usize,

    /// Index at which the warm-up period ends (0 = no warm-up)
    pub warmup_index: usize,

    /// Index at which the trajectory stops if nothing stops it earlier
    pub horizon_index: usize,

    /// Earliest index at which an eradication stop is acceptable when
    /// re-running until accepted
    pub min_acceptable_index: usize,

    /// Annual discount rate applied per decision interval
    pub annual_discount_rate: f64,

    /// How cost and health combine into the policy reward
    pub objective: Objective,

    /// Whether out-of-range calibration readings reject the trajectory
    /// (off for full-factorial parameter exploration)
    pub check_calibration: bool,

    /// Whether to record per-Δt history tables (memory-expensive across
    /// many replications)
    pub store_trajectories: bool,

    /// Base RNG seed; replication r runs with `base_seed + r`
    pub base_seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            delta_t: 1.0 / 52.0,
            indices_per_decision_interval: 1,
            indices_per_observation_period: 1,
            warmup_index: 0,
            horizon_index: 52,
            min_acceptable_index: 0,
            annual_discount_rate: 0.0,
            objective: Objective::NetMonetaryBenefit { wtp: 50_000.0 },
            check_calibration: false,
            store_trajectories: false,
            base_seed: 1,
        }
    }
}

/// Why a trajectory stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Reached the configured horizon
    HorizonReached,
    /// All empty-to-eradicate classes reached zero members
    Eradicated,
    /// A calibration-checked statistic left its feasible range
    CalibrationInfeasible,
}

/// Outcome of one completed trajectory
#[derive(Debug)]
pub struct TrajectoryOutcome {
    /// Replication number this trajectory ran as
    pub replication: u64,
    /// Seed the trajectory actually ran with
    pub seed: u64,
    pub stop_reason: StopReason,
    /// Time index at which the trajectory stopped
    pub final_time_index: usize,
    /// Discounted cost over the whole trajectory
    pub total_discounted_cost: f64,
    /// Discounted QALYs over the whole trajectory
    pub total_discounted_qaly: f64,
    /// Sum of per-interval rewards under the objective
    pub total_reward: f64,
    /// Remaining members at stop, summed over all classes
    pub final_population: i64,
    /// Discrete state changes, in order
    pub events: EventLog,
    /// Per-Δt tables; empty unless `store_trajectories` is set
    pub history: TrajectoryHistory,
}

/// Errors raised by model validation and trajectory execution
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown class id {0}")]
    UnknownClass(usize),

    #[error("unknown resource id {0}")]
    UnknownResource(usize),

    #[error("unknown statistic id {0}")]
    UnknownStatistic(usize),

    #[error("unknown parameter id {0}")]
    UnknownParameter(usize),

    #[error("no trajectory accepted after {attempts} attempts")]
    NoAcceptedTrajectory { attempts: usize },
}

// ============================================================================
// Trajectory
// ============================================================================

/// One runnable trajectory: validated model plus all per-run state
///
/// Reusable across replications: `simulate` resets everything before running.
pub struct Trajectory {
    state: TrajectoryState,
    matrices: ContactMatrices,
    settings: ModelSettings,
    clock: SimClock,
    rng: RngManager,
    decision_engine: DecisionEngine,
    accumulator: CostHealthAccumulator,
    policy: Box<dyn EpidemicPolicy>,
}

impl std::fmt::Debug for Trajectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trajectory")
            .field("time_index", &self.clock.time_index())
            .field("num_classes", &self.state.num_classes())
            .field("num_interventions", &self.state.num_interventions())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Trajectory {
    /// Validate the model and build a runnable trajectory
    pub fn new(
        state: TrajectoryState,
        matrices: ContactMatrices,
        settings: ModelSettings,
    ) -> Result<Self, SimulationError> {
        Self::validate(&state, &matrices, &settings)?;
        let clock = SimClock::new(
            settings.delta_t,
            settings.indices_per_decision_interval,
            settings.indices_per_observation_period,
            settings.warmup_index,
        );
        let rng = RngManager::new(settings.base_seed);
        let decision_engine = DecisionEngine::new(&state);
        Ok(Self {
            state,
            matrices,
            settings,
            clock,
            rng,
            decision_engine,
            accumulator: CostHealthAccumulator::new(),
            policy: Box::new(StatusQuoPolicy),
        })
    }

    /// Attach an external policy for dynamically controlled interventions
    pub fn with_policy(mut self, policy: Box<dyn EpidemicPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &TrajectoryState {
        &self.state
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Seed used for a given replication
    pub fn seed_for(&self, replication: u64) -> u64 {
        self.settings.base_seed.wrapping_add(replication)
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    fn validate(
        state: &TrajectoryState,
        matrices: &ContactMatrices,
        settings: &ModelSettings,
    ) -> Result<(), SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));

        if settings.delta_t <= 0.0 {
            return invalid("delta_t must be positive".into());
        }
        if settings.indices_per_decision_interval == 0 {
            return invalid("indices_per_decision_interval must be positive".into());
        }
        if settings.indices_per_observation_period == 0 {
            return invalid("indices_per_observation_period must be positive".into());
        }
        if settings.horizon_index == 0 {
            return invalid("horizon_index must be positive".into());
        }
        if settings.annual_discount_rate < 0.0 {
            return invalid("annual_discount_rate must be non-negative".into());
        }

        let num_classes = state.num_classes();
        let num_pathogens = matrices.num_pathogens();

        // Contact matrices must cover every in-effect combination.
        let expected_combinations = 1usize << state.num_interventions();
        if matrices.num_combinations() != expected_combinations {
            return invalid(format!(
                "contact matrices cover {} combinations, model has {} interventions ({} needed)",
                matrices.num_combinations(),
                state.num_interventions(),
                expected_combinations
            ));
        }

        for class in state.classes() {
            if class.is_normal() && class.row_index() >= matrices.num_groups() {
                return invalid(format!(
                    "class '{}' uses mixing group {} but matrices have {} groups",
                    class.name(),
                    class.row_index(),
                    matrices.num_groups()
                ));
            }
            for process in class.processes() {
                if process.destination >= num_classes {
                    return Err(SimulationError::UnknownClass(process.destination));
                }
                match process.kind {
                    ProcessKind::RateDriven { rate_param } => {
                        if !state.parameters().contains(rate_param) {
                            return Err(SimulationError::UnknownParameter(rate_param));
                        }
                    }
                    ProcessKind::Infection { pathogen } => {
                        if pathogen >= num_pathogens {
                            return invalid(format!(
                                "class '{}' references unknown pathogen {}",
                                class.name(),
                                pathogen
                            ));
                        }
                    }
                }
                if let Some(iv) = process.activating_intervention {
                    if iv >= state.num_interventions() {
                        return invalid(format!(
                            "class '{}' gated on unknown intervention {}",
                            class.name(),
                            iv
                        ));
                    }
                }
            }
            match *class.kind() {
                ClassKind::Splitting { probability_param, primary, secondary } => {
                    if primary >= num_classes {
                        return Err(SimulationError::UnknownClass(primary));
                    }
                    if secondary >= num_classes {
                        return Err(SimulationError::UnknownClass(secondary));
                    }
                    if !state.parameters().contains(probability_param) {
                        return Err(SimulationError::UnknownParameter(probability_param));
                    }
                }
                ClassKind::ResourceMonitor { resource, served, overflow, .. } => {
                    if served >= num_classes {
                        return Err(SimulationError::UnknownClass(served));
                    }
                    if overflow >= num_classes {
                        return Err(SimulationError::UnknownClass(overflow));
                    }
                    if resource >= state.num_resources() {
                        return Err(SimulationError::UnknownResource(resource));
                    }
                }
                ClassKind::Normal | ClassKind::Death => {}
            }
        }

        Self::reject_router_cycles(state)?;

        for iv in state.interventions() {
            if iv.kind() == InterventionKind::Default
                && !matches!(iv.rule(), SwitchingRule::Predetermined { value: true })
            {
                return invalid(format!(
                    "default intervention '{}' must be predetermined on",
                    iv.name()
                ));
            }
            if let SwitchingRule::ThresholdBased { statistic, .. } = iv.rule() {
                if *statistic >= state.summation_stats().len() {
                    return Err(SimulationError::UnknownStatistic(*statistic));
                }
            }
            if let Some(resource) = iv.required_resource() {
                if resource >= state.num_resources() {
                    return Err(SimulationError::UnknownResource(resource));
                }
            }
        }

        for resource in state.resources() {
            let params = match resource.replenishment() {
                Some(Replenishment::OneTime { time_param, amount_param }) => {
                    vec![*time_param, *amount_param]
                }
                Some(Replenishment::Periodic { amount_param, .. }) => vec![*amount_param],
                None => vec![],
            };
            for param in params {
                if !state.parameters().contains(param) {
                    return Err(SimulationError::UnknownParameter(param));
                }
            }
        }

        for stat in state.summation_stats() {
            for &class in stat.source().classes() {
                if class >= num_classes {
                    return Err(SimulationError::UnknownClass(class));
                }
            }
        }
        for ratio in state.ratio_stats() {
            for stat in [ratio.numerator(), ratio.denominator()] {
                if stat >= state.summation_stats().len() {
                    return Err(SimulationError::UnknownStatistic(stat));
                }
            }
        }

        Ok(())
    }

    /// Routers must form a DAG or the same-Δt cascade would never settle
    fn reject_router_cycles(state: &TrajectoryState) -> Result<(), SimulationError> {
        let num_classes = state.num_classes();
        for start in 0..num_classes {
            if !state.class(start).routes_arrivals() {
                continue;
            }
            // Follow router edges; a walk longer than the class count loops.
            let mut frontier = vec![start];
            for _hop in 0..num_classes {
                let mut next = Vec::new();
                for &id in &frontier {
                    if let &ClassKind::Splitting { primary, secondary, .. } = state.class(id).kind()
                    {
                        for dest in [primary, secondary] {
                            if dest == start {
                                return Err(SimulationError::InvalidConfig(format!(
                                    "router cycle through class '{}'",
                                    state.class(start).name()
                                )));
                            }
                            if state.class(dest).routes_arrivals() {
                                next.push(dest);
                            }
                        }
                    } else if let &ClassKind::ResourceMonitor { served, overflow, .. } =
                        state.class(id).kind()
                    {
                        for dest in [served, overflow] {
                            if dest == start {
                                return Err(SimulationError::InvalidConfig(format!(
                                    "router cycle through class '{}'",
                                    state.class(start).name()
                                )));
                            }
                            if state.class(dest).routes_arrivals() {
                                next.push(dest);
                            }
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }
                frontier = next;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------------

    /// Run one full trajectory for the given replication number
    ///
    /// Resets all mutable state first, so trajectories are independent and a
    /// given `(model, replication)` pair always produces identical output.
    pub fn simulate(&mut self, replication: u64) -> TrajectoryOutcome {
        self.simulate_to(replication, self.settings.horizon_index)
    }

    /// Run a trajectory stopping no later than `stop_time_index`
    ///
    /// Useful for partial rollouts; the configured horizon still applies as
    /// an upper bound.
    pub fn simulate_to(&mut self, replication: u64, stop_time_index: usize) -> TrajectoryOutcome {
        let stop = stop_time_index.min(self.settings.horizon_index);
        self.simulate_seeded(replication, self.seed_for(replication), stop)
    }

    fn simulate_seeded(&mut self, replication: u64, seed: u64, stop_index: usize) -> TrajectoryOutcome {
        self.state.reset();
        self.clock.reset();
        self.accumulator.reset();
        self.rng = RngManager::new(seed);

        let mut events = EventLog::new();
        let mut history = TrajectoryHistory::new(self.settings.store_trajectories);
        let mut total_reward = 0.0;
        let mut warmup_done = self.settings.warmup_index == 0;
        let mut stop_reason = StopReason::HorizonReached;

        // Per-interval discount factor from the annual rate.
        let years_per_interval =
            self.settings.indices_per_decision_interval as f64 * self.settings.delta_t;
        let interval_discount =
            1.0 / (1.0 + self.settings.annual_discount_rate).powf(years_per_interval);

        // Row 0 is the initial state; later rows are appended post-step.
        history.record(0, &self.state);

        loop {
            let t = self.clock.time_index();

            // STEP 1: RESOURCE REPLENISHMENT
            // Runs before decisions so feasibility sees stock delivered at t.
            crate::resources::replenish(&mut self.state, t, &mut events);

            // STEP 2: DECISIONS
            if self.clock.is_decision_point() {
                if t > 0 {
                    // Close the interval that just ended and pay the policy.
                    let completed = self.clock.decision_interval() - 1;
                    let factor = interval_discount.powi(completed as i32);
                    let reward = self
                        .accumulator
                        .flush_interval(self.settings.objective, factor);
                    total_reward += reward;
                    self.policy.receive_reward(completed, reward);
                }
                self.decision_engine.make_and_announce_decisions(
                    &mut self.state,
                    t,
                    self.clock.epidemic_time(),
                    self.policy.as_mut(),
                    &mut self.rng,
                    &mut self.accumulator,
                    &mut events,
                );
            }

            // STEP 3: IMPLEMENT MATURED DECISIONS
            self.decision_engine
                .implement_pending(&mut self.state, t, &mut events);

            // STEP 4: ADVANCE PARAMETERS
            self.state.parameters_mut().advance(t);

            // STEP 5: TRANSMISSION RATES
            transmission::update_transmission_rates(&mut self.state, &self.matrices);

            // STEP 6: MEMBER TRANSFER
            transmission::transfer_class_members(
                &mut self.state,
                &mut self.rng,
                self.settings.delta_t,
            );

            // STEP 7: STATISTICS
            outcomes::update_statistics(&mut self.state);

            // STEP 8: COST/HEALTH ACCRUAL
            self.accumulator.accrue_step(&self.state, self.settings.delta_t);

            // STEP 9: OBSERVATION PERIOD CLOSE
            self.clock.advance();
            let t_next = self.clock.time_index();
            if self.clock.is_observation_boundary() {
                let check = self.settings.check_calibration && warmup_done;
                let violation = outcomes::close_observation_period(
                    &mut self.state,
                    t_next,
                    check,
                    &mut events,
                );
                if violation.is_some() {
                    stop_reason = StopReason::CalibrationInfeasible;
                }
            }

            // STEP 10: WARM-UP BOUNDARY
            if !warmup_done && self.clock.warmup_ended() {
                warmup_done = true;
                self.state.reset_statistics();
                self.accumulator.reset();
                total_reward = 0.0;
                events.log(EpidemicEvent::WarmupEnded { time_index: t_next });
            }

            // STEP 11: HISTORY AND STOP CONDITIONS
            history.record(t_next, &self.state);
            if stop_reason == StopReason::CalibrationInfeasible {
                break;
            }
            if self.state.is_eradicated() {
                events.log(EpidemicEvent::Eradicated { time_index: t_next });
                stop_reason = StopReason::Eradicated;
                break;
            }
            if t_next >= stop_index {
                stop_reason = StopReason::HorizonReached;
                break;
            }
        }

        // Close the final (possibly partial) interval. On an interval
        // boundary `decision_interval()` already names the next interval;
        // the one that just finished is one behind.
        let final_interval = if self.clock.is_decision_point() {
            self.clock.decision_interval().saturating_sub(1)
        } else {
            self.clock.decision_interval()
        };
        let factor = interval_discount.powi(final_interval as i32);
        let reward = self
            .accumulator
            .flush_interval(self.settings.objective, factor);
        total_reward += reward;
        self.policy.receive_reward(final_interval, reward);

        TrajectoryOutcome {
            replication,
            seed,
            stop_reason,
            final_time_index: self.clock.time_index(),
            total_discounted_cost: self.accumulator.total_discounted_cost(),
            total_discounted_qaly: self.accumulator.total_discounted_qaly(),
            total_reward,
            final_population: self.state.total_population(),
            events,
            history,
        }
    }

    /// Re-run a replication with fresh seeds until a trajectory is accepted
    ///
    /// A trajectory is rejected when calibration fails, or when it eradicates
    /// before `min_acceptable_index`. Each retry reseeds with a fixed stride
    /// so accepted outcomes stay reproducible.
    pub fn simulate_until_accepted(
        &mut self,
        replication: u64,
        max_attempts: usize,
    ) -> Result<TrajectoryOutcome, SimulationError> {
        const RESEED_STRIDE: u64 = 1_000_003;

        for attempt in 0..max_attempts {
            let seed = self
                .seed_for(replication)
                .wrapping_add(attempt as u64 * RESEED_STRIDE);
            let outcome = self.simulate_seeded(replication, seed, self.settings.horizon_index);
            let accepted = match outcome.stop_reason {
                StopReason::CalibrationInfeasible => false,
                StopReason::Eradicated => {
                    outcome.final_time_index >= self.settings.min_acceptable_index
                }
                StopReason::HorizonReached => true,
            };
            if accepted {
                return Ok(outcome);
            }
        }
        Err(SimulationError::NoAcceptedTrajectory { attempts: max_attempts })
    }
}

// ============================================================================
// Replication aggregation
// ============================================================================

/// Aggregate results across completed replications
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationSummary {
    pub num_replications: usize,
    pub mean_discounted_cost: f64,
    pub mean_discounted_qaly: f64,
    pub mean_reward: f64,
    /// Fraction of replications that stopped by eradication
    pub eradication_fraction: f64,
    pub mean_final_time_index: f64,
    /// Mean discounted cost per simulated year, over horizon-complete
    /// replications only; `None` when every replication stopped early
    pub mean_annualized_cost: Option<f64>,
}

/// Run `num_replications` accepted trajectories and summarize them
///
/// Replication r always runs from seed `base_seed + r`, so results are
/// reproducible regardless of how many replications are requested.
pub fn run_replications(
    trajectory: &mut Trajectory,
    num_replications: u64,
    max_attempts_each: usize,
) -> Result<(Vec<TrajectoryOutcome>, ReplicationSummary), SimulationError> {
    let mut outcomes = Vec::with_capacity(num_replications as usize);
    for replication in 0..num_replications {
        outcomes.push(trajectory.simulate_until_accepted(replication, max_attempts_each)?);
    }

    let n = outcomes.len().max(1) as f64;
    let delta_t = trajectory.settings().delta_t;
    let completed: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.stop_reason == StopReason::HorizonReached && o.final_time_index > 0)
        .map(|o| o.total_discounted_cost / (o.final_time_index as f64 * delta_t))
        .collect();
    let mean_annualized_cost = if completed.is_empty() {
        None
    } else {
        Some(completed.iter().sum::<f64>() / completed.len() as f64)
    };
    let summary = ReplicationSummary {
        num_replications: outcomes.len(),
        mean_discounted_cost: outcomes.iter().map(|o| o.total_discounted_cost).sum::<f64>() / n,
        mean_discounted_qaly: outcomes.iter().map(|o| o.total_discounted_qaly).sum::<f64>() / n,
        mean_reward: outcomes.iter().map(|o| o.total_reward).sum::<f64>() / n,
        eradication_fraction: outcomes
            .iter()
            .filter(|o| o.stop_reason == StopReason::Eradicated)
            .count() as f64
            / n,
        mean_final_time_index: outcomes.iter().map(|o| o.final_time_index as f64).sum::<f64>() / n,
        mean_annualized_cost,
    };
    Ok((outcomes, summary))
}
