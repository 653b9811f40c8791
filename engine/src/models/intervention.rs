//! Interventions and their on/off switching rules
//!
//! An intervention is a controllable on/off lever (vaccination campaign,
//! school closure, treatment program). Its switching rule constrains which
//! on/off values are feasible at a decision point; the Decision Engine
//! (`crate::decision`) assembles full combinations from these per-rule
//! feasibility checks.
//!
//! # Critical Invariants
//!
//! 1. A Default intervention is always on.
//! 2. An intervention flagged `remains_on_once_turned_on` can never be turned
//!    off again once it has been employed.
//! 3. "Announced" and "in effect" are distinct: a turn-on only takes effect
//!    `delay_indices` after it is announced.

use serde::{Deserialize, Serialize};

use crate::models::resource::ResourceId;
use crate::models::statistics::StatId;

/// Index of an intervention within the trajectory state
pub type InterventionId = usize;

/// Whether the intervention is part of the base case or an add-on lever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterventionKind {
    /// Always on; represents the do-nothing baseline conditions
    Default,
    /// May be switched on/off subject to its rule
    Additive,
}

/// On/off switching rule of an intervention
///
/// Each variant carries exactly the configuration its feasibility check
/// needs; mutable timing state lives on the owning [`Intervention`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwitchingRule {
    /// Fixed to a configured value for the whole trajectory
    Predetermined { value: bool },

    /// On for `duration` indices from the last turn-on, then mandatorily off
    /// until a full `frequency` window has elapsed since that turn-on
    Periodic { duration: usize, frequency: usize },

    /// Turns on when an observed statistic reaches `threshold`; once on it is
    /// committed for `min_duration` indices even if the statistic drops back
    /// (hysteresis); once off it cannot re-trigger until the statistic
    /// crosses the threshold again
    ThresholdBased {
        statistic: StatId,
        threshold: f64,
        min_duration: usize,
    },

    /// Usable only within `[start, end)` and only in blocks of at least
    /// `min_block` indices
    IntervalBased {
        start: usize,
        end: usize,
        min_block: usize,
    },

    /// Delegated to the external policy collaborator
    Dynamic,
}

/// Read-only context a rule needs to judge feasibility
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    /// Current time index
    pub time_index: usize,
    /// Announced on/off value from the previous decision
    pub currently_on: bool,
    /// Observed (surveillance-delayed) value of the rule's statistic, if any
    /// observation has been recorded yet
    pub observed_value: Option<f64>,
    /// Units currently available on the gating resource (i64::MAX when the
    /// intervention has no resource requirement)
    pub resource_units: i64,
}

/// A controllable intervention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    id: InterventionId,
    name: String,
    kind: InterventionKind,
    rule: SwitchingRule,
    /// Time window `[start, end)` outside which the intervention can never be
    /// turned on; `None` means always available in time
    availability_window: Option<(usize, usize)>,
    /// Resource that must have units available for a turn-on to be feasible
    required_resource: Option<ResourceId>,
    /// Indices between an announced turn-on and it taking effect
    delay_indices: usize,
    /// One-time cost charged when a turn-on is announced
    fixed_cost: f64,
    /// Cost charged every decision interval while in effect
    cost_per_decision_period: f64,
    /// Penalty charged when a turn-off is announced
    penalty_cost: f64,
    /// Once employed, no rule may ever turn this intervention off
    remains_on_once_turned_on: bool,

    // Mutable turn-on/turn-off bookkeeping, reset between trajectories
    ever_turned_on: bool,
    time_last_turned_on: Option<usize>,
    time_last_turned_off: Option<usize>,
    /// Time index at which a pending announced turn-on takes effect
    pending_effect_index: Option<usize>,
}

impl Intervention {
    pub fn new(
        id: InterventionId,
        name: impl Into<String>,
        kind: InterventionKind,
        rule: SwitchingRule,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            rule,
            availability_window: None,
            required_resource: None,
            delay_indices: 0,
            fixed_cost: 0.0,
            cost_per_decision_period: 0.0,
            penalty_cost: 0.0,
            remains_on_once_turned_on: false,
            ever_turned_on: false,
            time_last_turned_on: None,
            time_last_turned_off: None,
            pending_effect_index: None,
        }
    }

    pub fn with_availability_window(mut self, start: usize, end: usize) -> Self {
        assert!(start < end, "availability window must be non-empty");
        self.availability_window = Some((start, end));
        self
    }

    pub fn with_required_resource(mut self, resource: ResourceId) -> Self {
        self.required_resource = Some(resource);
        self
    }

    pub fn with_delay(mut self, delay_indices: usize) -> Self {
        self.delay_indices = delay_indices;
        self
    }

    pub fn with_costs(mut self, fixed: f64, per_decision_period: f64, penalty: f64) -> Self {
        self.fixed_cost = fixed;
        self.cost_per_decision_period = per_decision_period;
        self.penalty_cost = penalty;
        self
    }

    pub fn with_remains_on_once_turned_on(mut self) -> Self {
        self.remains_on_once_turned_on = true;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> InterventionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InterventionKind {
        self.kind
    }

    pub fn rule(&self) -> &SwitchingRule {
        &self.rule
    }

    pub fn required_resource(&self) -> Option<ResourceId> {
        self.required_resource
    }

    pub fn delay_indices(&self) -> usize {
        self.delay_indices
    }

    pub fn fixed_cost(&self) -> f64 {
        self.fixed_cost
    }

    pub fn cost_per_decision_period(&self) -> f64 {
        self.cost_per_decision_period
    }

    pub fn penalty_cost(&self) -> f64 {
        self.penalty_cost
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.rule, SwitchingRule::Dynamic)
    }

    pub fn ever_turned_on(&self) -> bool {
        self.ever_turned_on
    }

    pub fn time_last_turned_on(&self) -> Option<usize> {
        self.time_last_turned_on
    }

    pub fn time_last_turned_off(&self) -> Option<usize> {
        self.time_last_turned_off
    }

    pub fn pending_effect_index(&self) -> Option<usize> {
        self.pending_effect_index
    }

    // ========================================================================
    // Feasibility
    // ========================================================================

    /// Whether announcing `candidate` (true = on) is feasible right now
    pub fn is_feasible(&self, candidate: bool, ctx: &RuleContext) -> bool {
        // A Default intervention is always on, never off.
        if self.kind == InterventionKind::Default {
            return candidate;
        }

        // Remains-on commitment dominates every rule.
        if self.remains_on_once_turned_on && self.ever_turned_on {
            return candidate;
        }

        if candidate {
            // Turn-on gating shared by all rules: time window and resource.
            if let Some((start, end)) = self.availability_window {
                if ctx.time_index < start || ctx.time_index >= end {
                    return false;
                }
            }
            if self.required_resource.is_some() && ctx.resource_units <= 0 {
                return false;
            }
        }

        match &self.rule {
            SwitchingRule::Predetermined { value } => candidate == *value,

            SwitchingRule::Periodic { duration, frequency } => {
                match self.time_last_turned_on {
                    None => {
                        // Never used: free to start a cycle, or stay off.
                        true
                    }
                    Some(on_at) => {
                        let in_on_window = ctx.currently_on && ctx.time_index < on_at + duration;
                        if candidate {
                            in_on_window || ctx.time_index >= on_at + frequency
                        } else {
                            // Mandatorily on through the configured duration.
                            !in_on_window
                        }
                    }
                }
            }

            SwitchingRule::ThresholdBased { threshold, min_duration, .. } => {
                let triggered = ctx.observed_value.is_some_and(|v| v >= *threshold);
                let committed = ctx.currently_on
                    && self
                        .time_last_turned_on
                        .is_some_and(|on_at| ctx.time_index < on_at + min_duration);
                if candidate {
                    triggered || committed
                } else {
                    !committed && !(ctx.currently_on && triggered)
                }
            }

            SwitchingRule::IntervalBased { start, end, min_block } => {
                let committed = ctx.currently_on
                    && self
                        .time_last_turned_on
                        .is_some_and(|on_at| ctx.time_index < on_at + min_block);
                if candidate {
                    ctx.time_index >= *start && ctx.time_index < *end
                } else {
                    !(committed && ctx.time_index < *end)
                }
            }

            // Any value the external policy picks is feasible here; shared
            // gating above already constrained turn-ons.
            SwitchingRule::Dynamic => true,
        }
    }

    // ========================================================================
    // Decision bookkeeping
    // ========================================================================

    /// Record an announced turn-on; returns the index it will take effect
    pub(crate) fn record_turn_on(&mut self, time_index: usize) -> usize {
        self.ever_turned_on = true;
        self.time_last_turned_on = Some(time_index);
        let effect_index = time_index + self.delay_indices;
        self.pending_effect_index = Some(effect_index);
        effect_index
    }

    /// Record an announced turn-off (takes effect without delay)
    pub(crate) fn record_turn_off(&mut self, time_index: usize) {
        self.time_last_turned_off = Some(time_index);
        self.pending_effect_index = None;
    }

    /// Clear a matured pending turn-on
    pub(crate) fn clear_pending_effect(&mut self) {
        self.pending_effect_index = None;
    }

    /// Restore to pre-trajectory state
    pub fn reset(&mut self) {
        self.ever_turned_on = false;
        self.time_last_turned_on = None;
        self.time_last_turned_off = None;
        self.pending_effect_index = None;
    }
}
