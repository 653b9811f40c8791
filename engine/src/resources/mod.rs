//! Resource Manager
//!
//! Applies replenishment schedules, debits consumption, and keeps dependents
//! informed of availability. Classes and interventions never mutate resources
//! directly; routing logic and the Decision Engine call into this module.
//!
//! # Critical Invariants
//!
//! 1. Available units never go negative: consumption that exceeds
//!    availability is rejected, not clamped.
//! 2. Replenishment timing and amounts come from sampled parameters, so a
//!    trajectory reset restores the schedule exactly.

use thiserror::Error;

use crate::models::record::{EpidemicEvent, EventLog};
use crate::models::resource::{Replenishment, ResourceId};
use crate::models::state::TrajectoryState;

/// Errors raised by resource operations
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("insufficient units of resource {resource}: required {required}, available {available}")]
    InsufficientUnits {
        resource: ResourceId,
        required: i64,
        available: i64,
    },
}

/// Apply one-time and periodic replenishment due at `time_index`
///
/// Delivery amounts are read from the parameter set, rounded down to whole
/// units, and negative sampled amounts deliver nothing.
pub fn replenish(state: &mut TrajectoryState, time_index: usize, log: &mut EventLog) {
    for id in 0..state.num_resources() {
        let due_amount = {
            let resource = state.resource(id);
            match resource.replenishment() {
                Some(Replenishment::OneTime { time_param, amount_param }) => {
                    let due_at = state.parameters().value(*time_param).max(0.0) as usize;
                    if !resource.one_time_applied() && time_index >= due_at {
                        Some((state.parameters().value(*amount_param), true))
                    } else {
                        None
                    }
                }
                Some(Replenishment::Periodic { first_index, period, amount_param }) => {
                    if time_index >= *first_index && (time_index - first_index) % period == 0 {
                        Some((state.parameters().value(*amount_param), false))
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some((raw_amount, one_time)) = due_amount {
            let amount = raw_amount.max(0.0) as i64;
            let resource = &mut state.resources_mut()[id];
            if one_time {
                resource.mark_one_time_applied();
            }
            if amount > 0 {
                resource.add_units(amount);
                log.log(EpidemicEvent::ResourceReplenished {
                    time_index,
                    resource: id,
                    amount,
                });
            }
        }
    }
}

/// Debit `amount` units of a resource
pub fn consume(
    state: &mut TrajectoryState,
    resource: ResourceId,
    amount: i64,
) -> Result<(), ResourceError> {
    state.resources_mut()[resource]
        .take_units(amount)
        .map_err(|available| ResourceError::InsufficientUnits {
            resource,
            required: amount,
            available,
        })
}

/// Units currently available on a resource
pub fn available_units(state: &TrajectoryState, resource: ResourceId) -> i64 {
    state.resource(resource).available_units()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parameter::{Parameter, ParameterSet};
    use crate::models::resource::Resource;

    fn state_with(resources: Vec<Resource>, parameters: Vec<Parameter>) -> TrajectoryState {
        TrajectoryState::new(
            vec![],
            vec![],
            resources,
            ParameterSet::new(parameters),
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_one_time_replenishment_applies_once() {
        let mut state = state_with(
            vec![Resource::new(
                0,
                "doses",
                0,
                Some(Replenishment::OneTime { time_param: 0, amount_param: 1 }),
            )],
            vec![Parameter::constant("arrival", 5.0), Parameter::constant("amount", 100.0)],
        );
        let mut log = EventLog::new();

        replenish(&mut state, 4, &mut log);
        assert_eq!(available_units(&state, 0), 0);

        replenish(&mut state, 5, &mut log);
        assert_eq!(available_units(&state, 0), 100);
        assert_eq!(log.len(), 1);

        // Never delivers again
        replenish(&mut state, 6, &mut log);
        assert_eq!(available_units(&state, 0), 100);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_periodic_replenishment() {
        let mut state = state_with(
            vec![Resource::new(
                0,
                "beds",
                10,
                Some(Replenishment::Periodic { first_index: 2, period: 3, amount_param: 0 }),
            )],
            vec![Parameter::constant("amount", 4.0)],
        );
        let mut log = EventLog::new();

        for t in 0..9 {
            replenish(&mut state, t, &mut log);
        }
        // Deliveries at t = 2, 5, 8
        assert_eq!(available_units(&state, 0), 10 + 3 * 4);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_consume_rejects_overdraw() {
        let mut state = state_with(vec![Resource::new(0, "doses", 3, None)], vec![]);
        assert!(consume(&mut state, 0, 2).is_ok());
        let err = consume(&mut state, 0, 5).unwrap_err();
        assert_eq!(
            err,
            ResourceError::InsufficientUnits { resource: 0, required: 5, available: 1 }
        );
        assert_eq!(available_units(&state, 0), 1);
    }

    #[test]
    fn test_negative_sampled_amount_delivers_nothing() {
        let mut state = state_with(
            vec![Resource::new(
                0,
                "doses",
                0,
                Some(Replenishment::Periodic { first_index: 0, period: 1, amount_param: 0 }),
            )],
            vec![Parameter::constant("amount", -2.0)],
        );
        let mut log = EventLog::new();
        replenish(&mut state, 0, &mut log);
        assert_eq!(available_units(&state, 0), 0);
        assert!(log.is_empty());
    }
}
