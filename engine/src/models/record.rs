//! Event logging and trajectory history tables
//!
//! The event log captures discrete state changes (decisions, replenishments,
//! warm-up reset, eradication, calibration violations) for replay and
//! debugging. The history tables capture time-indexed output (class counts,
//! statistic values, action combinations, resource availability) for the
//! reporting interface; because storing full trajectories across many
//! replications is memory-expensive, recording is gated by a configuration
//! flag.

use serde::{Deserialize, Serialize};

use crate::models::state::TrajectoryState;

/// A discrete state change worth auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EpidemicEvent {
    /// A new intervention combination was announced at a decision point
    DecisionAnnounced {
        time_index: usize,
        combination: Vec<bool>,
    },

    /// An announced turn-on matured (activation delay elapsed)
    DecisionInEffect {
        time_index: usize,
        intervention: usize,
        on: bool,
    },

    /// A resource received a delivery
    ResourceReplenished {
        time_index: usize,
        resource: usize,
        amount: i64,
    },

    /// The warm-up boundary was crossed and statistics were reset
    WarmupEnded { time_index: usize },

    /// All empty-to-eradicate classes reached zero members
    Eradicated { time_index: usize },

    /// A calibration-checked statistic left its feasible range
    CalibrationViolated {
        time_index: usize,
        statistic_name: String,
        value: f64,
    },
}

impl EpidemicEvent {
    /// Time index the event occurred at
    pub fn time_index(&self) -> usize {
        match self {
            EpidemicEvent::DecisionAnnounced { time_index, .. }
            | EpidemicEvent::DecisionInEffect { time_index, .. }
            | EpidemicEvent::ResourceReplenished { time_index, .. }
            | EpidemicEvent::WarmupEnded { time_index }
            | EpidemicEvent::Eradicated { time_index }
            | EpidemicEvent::CalibrationViolated { time_index, .. } => *time_index,
        }
    }
}

/// Append-only log of trajectory events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EpidemicEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: EpidemicEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[EpidemicEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpidemicEvent> {
        self.events.iter()
    }
}

/// Time-indexed output tables for one trajectory
///
/// Rows are appended once per Δt while `enabled` is set; a disabled history
/// records nothing and costs nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryHistory {
    enabled: bool,
    /// Time index of each recorded row
    time_indices: Vec<usize>,
    /// Member count per class, one row per Δt
    class_counts: Vec<Vec<i64>>,
    /// Current value per summation statistic, one row per Δt
    stat_values: Vec<Vec<f64>>,
    /// In-effect intervention combination, one row per Δt
    combinations: Vec<Vec<bool>>,
    /// Available units per resource, one row per Δt
    resource_levels: Vec<Vec<i64>>,
}

impl TrajectoryHistory {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Append one row for the current Δt; no-op when disabled
    pub fn record(&mut self, time_index: usize, state: &TrajectoryState) {
        if !self.enabled {
            return;
        }
        self.time_indices.push(time_index);
        self.class_counts
            .push(state.classes().iter().map(|c| c.count()).collect());
        self.stat_values.push(
            state
                .summation_stats()
                .iter()
                .map(|s| s.current_value())
                .collect(),
        );
        self.combinations.push(state.in_effect_combination().to_vec());
        self.resource_levels
            .push(state.resources().iter().map(|r| r.available_units()).collect());
    }

    pub fn len(&self) -> usize {
        self.time_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_indices.is_empty()
    }

    pub fn time_indices(&self) -> &[usize] {
        &self.time_indices
    }

    pub fn class_counts(&self) -> &[Vec<i64>] {
        &self.class_counts
    }

    pub fn stat_values(&self) -> &[Vec<f64>] {
        &self.stat_values
    }

    pub fn combinations(&self) -> &[Vec<bool>] {
        &self.combinations
    }

    pub fn resource_levels(&self) -> &[Vec<i64>] {
        &self.resource_levels
    }

    pub fn clear(&mut self) {
        self.time_indices.clear();
        self.class_counts.clear();
        self.stat_values.clear();
        self.combinations.clear();
        self.resource_levels.clear();
    }
}
