//! Domain entity model
//!
//! Passive data holders with update methods: classes, interventions,
//! resources, parameters, statistics, the trajectory state arena, and the
//! event log / history tables. All entities are created once per model build
//! and reused across trajectories.

pub mod class;
pub mod intervention;
pub mod parameter;
pub mod record;
pub mod resource;
pub mod state;
pub mod statistics;

pub use class::{ClassId, ClassKind, EpidemicClass, Process, ProcessKind};
pub use intervention::{
    Intervention, InterventionId, InterventionKind, RuleContext, SwitchingRule,
};
pub use parameter::{ParamId, Parameter, ParameterKind, ParameterSet};
pub use record::{EpidemicEvent, EventLog, TrajectoryHistory};
pub use resource::{Replenishment, Resource, ResourceId};
pub use state::TrajectoryState;
pub use statistics::{
    CalibrationTarget, RatioKind, RatioStatId, RatioStatistic, StatId, StatSource,
    SummationStatistic, RATIO_UNDEFINED,
};
