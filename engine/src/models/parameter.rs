//! Sampled model parameters
//!
//! Parameters feed process rates, splitting probabilities and resource
//! replenishment amounts. They are sampled/wired at model-build time and may
//! be time-dependent; the trajectory loop advances them once per Δt so every
//! component reads a consistent value within a step.

use serde::{Deserialize, Serialize};

/// Index of a parameter within the model's `ParameterSet`
pub type ParamId = usize;

/// How a parameter's value evolves over simulated time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Fixed at its sampled value for the whole trajectory
    Constant,

    /// Step function over time indices: `(start_index, value)` segments,
    /// sorted ascending by start index. Before the first segment the sampled
    /// base value applies.
    Piecewise(Vec<(usize, f64)>),
}

/// A single sampled parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    /// Value sampled at model build (the reset target)
    base_value: f64,
    kind: ParameterKind,
    /// Value in effect for the current Δt
    current_value: f64,
}

impl Parameter {
    /// Create a constant parameter
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            base_value: value,
            kind: ParameterKind::Constant,
            current_value: value,
        }
    }

    /// Create a piecewise time-dependent parameter
    ///
    /// # Panics
    /// Panics if the segments are not sorted by start index.
    pub fn piecewise(name: impl Into<String>, base_value: f64, segments: Vec<(usize, f64)>) -> Self {
        assert!(
            segments.windows(2).all(|w| w[0].0 < w[1].0),
            "piecewise segments must be sorted by start index"
        );
        Self {
            name: name.into(),
            base_value,
            kind: ParameterKind::Piecewise(segments),
            current_value: base_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value in effect for the current Δt
    pub fn value(&self) -> f64 {
        self.current_value
    }

    /// Recompute the value for the given time index
    fn advance(&mut self, time_index: usize) {
        if let ParameterKind::Piecewise(segments) = &self.kind {
            let mut value = self.base_value;
            for &(start, v) in segments {
                if time_index >= start {
                    value = v;
                } else {
                    break;
                }
            }
            self.current_value = value;
        }
    }

    fn reset(&mut self) {
        self.current_value = self.base_value;
    }
}

/// All parameters of a model, indexed by `ParamId`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Current value of a parameter
    ///
    /// # Panics
    /// Panics if the id is out of range; ids are validated at model build.
    pub fn value(&self, id: ParamId) -> f64 {
        self.parameters[id].value()
    }

    pub fn contains(&self, id: ParamId) -> bool {
        id < self.parameters.len()
    }

    /// Advance time-dependent parameters to the given time index
    pub fn advance(&mut self, time_index: usize) {
        for p in &mut self.parameters {
            p.advance(time_index);
        }
    }

    /// Restore all parameters to their sampled base values
    pub fn reset(&mut self) {
        for p in &mut self.parameters {
            p.reset();
        }
    }
}
