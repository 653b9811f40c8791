//! Trajectory state
//!
//! One explicit struct owns every piece of mutable simulation state: classes,
//! interventions, resources, parameters, statistics and the two intervention
//! combination vectors. The entity graph is built once per model; a trajectory
//! reset reinitializes this struct in place without reallocating it, which
//! also makes parallel trajectories trivially independent (one state arena per
//! trajectory).
//!
//! # Critical Invariants
//!
//! 1. **Conservation**: transfer/splitting logic alone never creates or
//!    destroys members; totals change only through explicitly modeled flows.
//! 2. **Combination consistency**: `announced` and `in_effect` always have one
//!    entry per intervention, indexed by `InterventionId`.
//! 3. **Topology immutability**: entity wiring (processes, destinations,
//!    statistic sources) never changes after model build.

use serde::{Deserialize, Serialize};

use crate::models::class::{ClassId, EpidemicClass};
use crate::models::intervention::{Intervention, InterventionId, InterventionKind};
use crate::models::parameter::ParameterSet;
use crate::models::resource::{Resource, ResourceId};
use crate::models::statistics::{RatioStatistic, StatId, SummationStatistic};

/// Complete mutable state of one trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryState {
    classes: Vec<EpidemicClass>,
    interventions: Vec<Intervention>,
    resources: Vec<Resource>,
    parameters: ParameterSet,
    summation_stats: Vec<SummationStatistic>,
    ratio_stats: Vec<RatioStatistic>,

    /// Decided on/off value per intervention (what was announced)
    announced: Vec<bool>,
    /// Applied on/off value per intervention (what is actually in effect)
    in_effect: Vec<bool>,
}

impl TrajectoryState {
    pub fn new(
        classes: Vec<EpidemicClass>,
        interventions: Vec<Intervention>,
        resources: Vec<Resource>,
        parameters: ParameterSet,
        summation_stats: Vec<SummationStatistic>,
        ratio_stats: Vec<RatioStatistic>,
    ) -> Self {
        let defaults: Vec<bool> = interventions
            .iter()
            .map(|iv| iv.kind() == InterventionKind::Default)
            .collect();
        Self {
            classes,
            interventions,
            resources,
            parameters,
            summation_stats,
            ratio_stats,
            announced: defaults.clone(),
            in_effect: defaults,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn classes(&self) -> &[EpidemicClass] {
        &self.classes
    }

    pub fn class(&self, id: ClassId) -> &EpidemicClass {
        &self.classes[id]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut EpidemicClass {
        &mut self.classes[id]
    }

    pub fn interventions(&self) -> &[Intervention] {
        &self.interventions
    }

    pub fn interventions_mut(&mut self) -> &mut [Intervention] {
        &mut self.interventions
    }

    pub fn intervention(&self, id: InterventionId) -> &Intervention {
        &self.interventions[id]
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut [Resource] {
        &mut self.resources
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id]
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    pub fn summation_stats(&self) -> &[SummationStatistic] {
        &self.summation_stats
    }

    pub fn ratio_stats(&self) -> &[RatioStatistic] {
        &self.ratio_stats
    }

    /// Split borrow for the per-Δt statistics update: summation statistics
    /// read classes, ratio statistics read summation statistics.
    pub(crate) fn split_stats_mut(
        &mut self,
    ) -> (&[EpidemicClass], &mut [SummationStatistic], &mut [RatioStatistic]) {
        (&self.classes, &mut self.summation_stats, &mut self.ratio_stats)
    }

    /// Observed (surveillance-delayed) reading of a summation statistic
    pub fn observed_stat(&self, id: StatId) -> Option<f64> {
        self.summation_stats[id].observed()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_interventions(&self) -> usize {
        self.interventions.len()
    }

    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    // ========================================================================
    // Intervention combinations
    // ========================================================================

    /// The announced on/off vector (decided, possibly not yet applied)
    pub fn announced_combination(&self) -> &[bool] {
        &self.announced
    }

    /// The in-effect on/off vector (applied, respecting activation delay)
    pub fn in_effect_combination(&self) -> &[bool] {
        &self.in_effect
    }

    pub fn is_announced_on(&self, id: InterventionId) -> bool {
        self.announced[id]
    }

    pub fn is_in_effect(&self, id: InterventionId) -> bool {
        self.in_effect[id]
    }

    pub(crate) fn set_announced(&mut self, id: InterventionId, on: bool) {
        self.announced[id] = on;
    }

    pub(crate) fn set_in_effect(&mut self, id: InterventionId, on: bool) {
        self.in_effect[id] = on;
    }

    /// Dense index of the in-effect combination (bit i = intervention i),
    /// used to select the precomputed contact matrix
    pub fn in_effect_combination_index(&self) -> usize {
        self.in_effect
            .iter()
            .enumerate()
            .fold(0usize, |acc, (i, &on)| acc | ((on as usize) << i))
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Total members across all classes
    pub fn total_population(&self) -> i64 {
        self.classes.iter().map(|c| c.count()).sum()
    }

    /// Whether all classes flagged empty-to-eradicate are empty
    ///
    /// False when no class carries the flag (eradication undetectable).
    pub fn is_eradicated(&self) -> bool {
        let mut any = false;
        for class in &self.classes {
            if class.empty_to_eradicate() {
                any = true;
                if class.count() > 0 {
                    return false;
                }
            }
        }
        any
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Reset statistics only (used when the warm-up period ends)
    pub fn reset_statistics(&mut self) {
        for stat in &mut self.summation_stats {
            stat.reset();
        }
        for ratio in &mut self.ratio_stats {
            ratio.reset();
        }
        for class in &mut self.classes {
            class.reset_accumulated_arrivals();
        }
    }

    /// Full reset to pre-trajectory state; reuses every allocation
    pub fn reset(&mut self) {
        for class in &mut self.classes {
            class.reset();
        }
        for iv in &mut self.interventions {
            iv.reset();
        }
        for resource in &mut self.resources {
            resource.reset();
        }
        self.parameters.reset();
        for stat in &mut self.summation_stats {
            stat.reset();
        }
        for ratio in &mut self.ratio_stats {
            ratio.reset();
        }
        for (i, iv) in self.interventions.iter().enumerate() {
            let default_on = iv.kind() == InterventionKind::Default;
            self.announced[i] = default_on;
            self.in_effect[i] = default_on;
        }
    }
}
