//! Time management for the simulation
//!
//! The simulation operates in discrete time indices of fixed length Δt.
//! Decision points, observation periods and the warm-up boundary are all
//! expressed as whole numbers of time indices. This module provides
//! deterministic time advancement.

use serde::{Deserialize, Serialize};

/// Manages simulation time in discrete Δt indices
///
/// # Example
/// ```
/// use epidemic_simulator_core_rs::SimClock;
///
/// // Δt = 1 day (in years), decisions every 7 indices, observations every 7
/// let mut clock = SimClock::new(1.0 / 365.0, 7, 7, 52);
/// assert_eq!(clock.time_index(), 0);
/// assert!(clock.is_decision_point());
///
/// clock.advance();
/// assert_eq!(clock.time_index(), 1);
/// assert!(!clock.is_decision_point());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Total Δt indices elapsed since trajectory start
    time_index: usize,
    /// Length of one Δt in years (drives discounting and epidemic time)
    delta_t: f64,
    /// Number of Δt indices between decision points
    indices_per_decision_interval: usize,
    /// Number of Δt indices in one observation period
    indices_per_observation_period: usize,
    /// Time index at which the warm-up period ends
    warmup_index: usize,
}

impl SimClock {
    /// Create a new clock
    ///
    /// # Panics
    /// Panics if `delta_t` is not positive or either interval length is zero.
    pub fn new(
        delta_t: f64,
        indices_per_decision_interval: usize,
        indices_per_observation_period: usize,
        warmup_index: usize,
    ) -> Self {
        assert!(delta_t > 0.0, "delta_t must be positive");
        assert!(
            indices_per_decision_interval > 0,
            "indices_per_decision_interval must be positive"
        );
        assert!(
            indices_per_observation_period > 0,
            "indices_per_observation_period must be positive"
        );
        Self {
            time_index: 0,
            delta_t,
            indices_per_decision_interval,
            indices_per_observation_period,
            warmup_index,
        }
    }

    /// Advance time by one Δt
    pub fn advance(&mut self) {
        self.time_index += 1;
    }

    /// Reset to the start of a trajectory
    pub fn reset(&mut self) {
        self.time_index = 0;
    }

    /// Current time index (total Δt steps since trajectory start)
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    /// Epidemic time in years (`time_index × Δt`)
    pub fn epidemic_time(&self) -> f64 {
        self.time_index as f64 * self.delta_t
    }

    /// Length of one Δt in years
    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    /// Whether the current index is a decision point
    ///
    /// Index 0 is a decision point; later points fall on whole multiples of
    /// the decision interval.
    pub fn is_decision_point(&self) -> bool {
        self.time_index % self.indices_per_decision_interval == 0
    }

    /// Decision interval the current index belongs to (0-indexed)
    pub fn decision_interval(&self) -> usize {
        self.time_index / self.indices_per_decision_interval
    }

    /// Number of Δt indices between decision points
    pub fn indices_per_decision_interval(&self) -> usize {
        self.indices_per_decision_interval
    }

    /// Whether an observation period closes at the current index
    ///
    /// The first boundary is at one full observation period, not at index 0.
    pub fn is_observation_boundary(&self) -> bool {
        self.time_index > 0 && self.time_index % self.indices_per_observation_period == 0
    }

    /// Observation period the current index belongs to (0-indexed)
    pub fn observation_period(&self) -> usize {
        self.time_index / self.indices_per_observation_period
    }

    /// Number of Δt indices in one observation period
    pub fn indices_per_observation_period(&self) -> usize {
        self.indices_per_observation_period
    }

    /// Time index at which the warm-up period ends
    pub fn warmup_index(&self) -> usize {
        self.warmup_index
    }

    /// Whether the warm-up boundary has been reached or passed
    pub fn warmup_ended(&self) -> bool {
        self.time_index >= self.warmup_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "delta_t must be positive")]
    fn test_zero_delta_t_panics() {
        SimClock::new(0.0, 7, 7, 0);
    }

    #[test]
    #[should_panic(expected = "indices_per_decision_interval must be positive")]
    fn test_zero_decision_interval_panics() {
        SimClock::new(1.0 / 365.0, 0, 7, 0);
    }

    #[test]
    fn test_decision_points() {
        let mut clock = SimClock::new(1.0 / 365.0, 7, 14, 30);
        assert!(clock.is_decision_point());
        for _ in 0..7 {
            clock.advance();
        }
        assert_eq!(clock.time_index(), 7);
        assert!(clock.is_decision_point());
        assert_eq!(clock.decision_interval(), 1);
        clock.advance();
        assert!(!clock.is_decision_point());
    }

    #[test]
    fn test_observation_boundary_not_at_zero() {
        let mut clock = SimClock::new(1.0 / 365.0, 7, 14, 30);
        assert!(!clock.is_observation_boundary());
        for _ in 0..14 {
            clock.advance();
        }
        assert!(clock.is_observation_boundary());
        assert_eq!(clock.observation_period(), 1);
    }

    #[test]
    fn test_warmup_and_reset() {
        let mut clock = SimClock::new(1.0 / 365.0, 7, 7, 10);
        assert!(!clock.warmup_ended());
        for _ in 0..10 {
            clock.advance();
        }
        assert!(clock.warmup_ended());
        clock.reset();
        assert_eq!(clock.time_index(), 0);
        assert!(!clock.warmup_ended());
    }

    #[test]
    fn test_epidemic_time() {
        let mut clock = SimClock::new(1.0 / 365.0, 7, 7, 0);
        for _ in 0..365 {
            clock.advance();
        }
        assert!((clock.epidemic_time() - 1.0).abs() < 1e-12);
    }
}
