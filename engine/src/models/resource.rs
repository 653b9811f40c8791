//! Constrained resources (drug stock, hospital beds, vaccine doses)
//!
//! Resources are owned by the Resource Manager (`crate::resources`) and
//! referenced read-only by classes and interventions via numeric id. Each Δt
//! the manager applies the replenishment scheme and pushes updated
//! availability to dependents.
//!
//! CRITICAL: available units never go negative. Consumers check availability
//! before debiting; the manager rejects over-consumption instead of clamping.

use serde::{Deserialize, Serialize};

use crate::models::parameter::ParamId;

/// Index of a resource within the trajectory state
pub type ResourceId = usize;

/// Replenishment scheme for a resource
///
/// Amounts and timing are read from sampled parameters so calibration can
/// vary them across trajectories without rebuilding the entity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Replenishment {
    /// A single delivery at a parameterized time index
    OneTime {
        /// Parameter holding the delivery time index
        time_param: ParamId,
        /// Parameter holding the delivered amount
        amount_param: ParamId,
    },

    /// Recurring deliveries every `period` indices starting at `first_index`
    Periodic {
        first_index: usize,
        period: usize,
        /// Parameter holding the per-delivery amount
        amount_param: ParamId,
    },
}

/// A constrained resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    /// Units available before any replenishment
    initial_units: i64,
    /// Units currently available
    available_units: i64,
    replenishment: Option<Replenishment>,
    /// Whether a one-time replenishment has already been applied
    one_time_applied: bool,
}

impl Resource {
    /// Create a resource
    ///
    /// # Panics
    /// Panics if `initial_units` is negative or a periodic scheme has a zero
    /// period.
    pub fn new(
        id: ResourceId,
        name: impl Into<String>,
        initial_units: i64,
        replenishment: Option<Replenishment>,
    ) -> Self {
        assert!(initial_units >= 0, "initial_units must be non-negative");
        if let Some(Replenishment::Periodic { period, .. }) = &replenishment {
            assert!(*period > 0, "replenishment period must be positive");
        }
        Self {
            id,
            name: name.into(),
            initial_units,
            available_units: initial_units,
            replenishment,
            one_time_applied: false,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available_units(&self) -> i64 {
        self.available_units
    }

    pub fn replenishment(&self) -> Option<&Replenishment> {
        self.replenishment.as_ref()
    }

    pub(crate) fn one_time_applied(&self) -> bool {
        self.one_time_applied
    }

    pub(crate) fn mark_one_time_applied(&mut self) {
        self.one_time_applied = true;
    }

    /// Add delivered units
    pub(crate) fn add_units(&mut self, amount: i64) {
        debug_assert!(amount >= 0);
        self.available_units += amount;
    }

    /// Debit consumed units; fails rather than going negative
    pub(crate) fn take_units(&mut self, amount: i64) -> Result<(), i64> {
        if amount > self.available_units {
            return Err(self.available_units);
        }
        self.available_units -= amount;
        Ok(())
    }

    /// Restore to pre-trajectory state
    pub fn reset(&mut self) {
        self.available_units = self.initial_units;
        self.one_time_applied = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_units_never_negative() {
        let mut r = Resource::new(0, "doses", 10, None);
        assert!(r.take_units(7).is_ok());
        assert_eq!(r.available_units(), 3);
        assert_eq!(r.take_units(5), Err(3));
        assert_eq!(r.available_units(), 3);
    }

    #[test]
    fn test_reset_restores_initial_units() {
        let mut r = Resource::new(0, "beds", 5, None);
        r.take_units(5).unwrap();
        r.add_units(2);
        r.reset();
        assert_eq!(r.available_units(), 5);
        assert!(!r.one_time_applied());
    }

    #[test]
    #[should_panic(expected = "initial_units must be non-negative")]
    fn test_negative_initial_units_panics() {
        Resource::new(0, "bad", -1, None);
    }
}
