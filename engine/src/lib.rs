//! Epidemic Simulator Core - Rust Engine
//!
//! Stochastic discrete-time compartmental disease simulator with
//! deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Time management (Δt indices, decision points, observation
//!   periods, warm-up)
//! - **models**: Domain types (classes, interventions, resources, parameters,
//!   statistics, trajectory state, event log)
//! - **decision**: Switching-rule evaluation and policy delegation
//! - **transmission**: Force-of-infection update and stochastic member
//!   transfer
//! - **resources**: Replenishment schedules and consumption
//! - **outcomes**: Statistics updates, calibration checks, cost/health
//!   accumulation
//! - **orchestrator**: Trajectory controller and replication runner
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All member counts are i64 (whole individuals)
//! 2. All randomness is deterministic (seeded RNG; replication r runs from
//!    seed `base_seed + r`)
//! 3. Transfer never creates or destroys members; totals change only through
//!    explicitly modeled flows

// Module declarations
pub mod core;
pub mod decision;
pub mod models;
pub mod orchestrator;
pub mod outcomes;
pub mod resources;
pub mod rng;
pub mod transmission;

// Re-exports for convenience
pub use self::core::time::SimClock;
pub use decision::{DecisionEngine, EpidemicPolicy, FeatureSnapshot, StatusQuoPolicy};
pub use models::{
    class::{ClassId, ClassKind, EpidemicClass, Process, ProcessKind},
    intervention::{Intervention, InterventionId, InterventionKind, RuleContext, SwitchingRule},
    parameter::{ParamId, Parameter, ParameterKind, ParameterSet},
    record::{EpidemicEvent, EventLog, TrajectoryHistory},
    resource::{Replenishment, Resource, ResourceId},
    state::TrajectoryState,
    statistics::{
        CalibrationTarget, RatioKind, RatioStatId, RatioStatistic, StatId, StatSource,
        SummationStatistic, RATIO_UNDEFINED,
    },
};
pub use orchestrator::{
    run_replications, ModelSettings, ReplicationSummary, SimulationError, StopReason, Trajectory,
    TrajectoryOutcome,
};
pub use outcomes::{CostHealthAccumulator, Objective};
pub use resources::ResourceError;
pub use rng::RngManager;
pub use transmission::{ContactMatrices, TransferResult};
