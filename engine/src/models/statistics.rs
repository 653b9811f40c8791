//! Derived observables: summation and ratio statistics
//!
//! Summation statistics read class populations or arrival counters each Δt;
//! ratio statistics are computed strictly from already-updated summation
//! statistics so every Δt sees a consistent pair. Statistics carry calibration
//! metadata (feasible range, goodness-of-fit weight) and a surveillance delay
//! expressed in observation periods.
//!
//! Lifecycle: reset at the start of each trajectory and once more when the
//! warm-up period ends.

use serde::{Deserialize, Serialize};

use crate::models::class::{ClassId, EpidemicClass};

/// Index of a summation statistic within the trajectory state
pub type StatId = usize;

/// Index of a ratio statistic within the trajectory state
pub type RatioStatId = usize;

/// Sentinel reported by ratio statistics when the denominator is zero.
///
/// One consistent policy everywhere: live values, history tables and observed
/// readings all carry the sentinel; calibration treats a sentinel reading as
/// not yet observable and skips the range check for that period.
pub const RATIO_UNDEFINED: f64 = -1.0;

/// What a summation statistic measures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatSource {
    /// New arrivals into the listed classes during one Δt
    Incidence { classes: Vec<ClassId> },

    /// Arrivals into the listed classes accumulated since the last reset
    AccumulatingIncidence { classes: Vec<ClassId> },

    /// Current total membership of the listed classes
    Prevalence { classes: Vec<ClassId> },
}

impl StatSource {
    pub fn classes(&self) -> &[ClassId] {
        match self {
            StatSource::Incidence { classes }
            | StatSource::AccumulatingIncidence { classes }
            | StatSource::Prevalence { classes } => classes,
        }
    }
}

/// Calibration metadata attached to a statistic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTarget {
    /// Lower bound of the feasible range (inclusive)
    pub feasible_min: f64,
    /// Upper bound of the feasible range (inclusive)
    pub feasible_max: f64,
    /// Goodness-of-fit weight for the external calibration collaborator
    pub weight: f64,
    /// Whether an out-of-range observation rejects the trajectory
    pub check_within_feasible_range: bool,
}

impl CalibrationTarget {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.feasible_min && value <= self.feasible_max
    }
}

/// A summation statistic (incidence, accumulating incidence or prevalence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummationStatistic {
    id: StatId,
    name: String,
    source: StatSource,
    /// Observation periods between a reading being recorded and it becoming
    /// visible to decisions/features
    surveillance_delay_periods: usize,
    calibration: Option<CalibrationTarget>,

    // Mutable per-trajectory state
    /// Value for the current Δt
    current_value: f64,
    /// Value accumulating within the current observation period
    period_value: f64,
    /// One recorded value per closed observation period
    recorded_periods: Vec<f64>,
}

impl SummationStatistic {
    pub fn new(id: StatId, name: impl Into<String>, source: StatSource) -> Self {
        Self {
            id,
            name: name.into(),
            source,
            surveillance_delay_periods: 0,
            calibration: None,
            current_value: 0.0,
            period_value: 0.0,
            recorded_periods: Vec::new(),
        }
    }

    pub fn with_surveillance_delay(mut self, periods: usize) -> Self {
        self.surveillance_delay_periods = periods;
        self
    }

    pub fn with_calibration(mut self, target: CalibrationTarget) -> Self {
        self.calibration = Some(target);
        self
    }

    pub fn id(&self) -> StatId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &StatSource {
        &self.source
    }

    pub fn calibration(&self) -> Option<&CalibrationTarget> {
        self.calibration.as_ref()
    }

    /// Value for the current Δt
    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    /// Value recorded for the most recently closed observation period
    pub fn last_recorded(&self) -> Option<f64> {
        self.recorded_periods.last().copied()
    }

    /// Observed reading, lagged by the surveillance delay
    pub fn observed(&self) -> Option<f64> {
        let n = self.recorded_periods.len();
        if n > self.surveillance_delay_periods {
            Some(self.recorded_periods[n - 1 - self.surveillance_delay_periods])
        } else {
            None
        }
    }

    /// Recompute from class state for the current Δt
    pub fn update(&mut self, classes: &[EpidemicClass]) {
        self.current_value = match &self.source {
            StatSource::Incidence { classes: ids } => ids
                .iter()
                .map(|&c| classes[c].arrivals_this_step() as f64)
                .sum(),
            StatSource::AccumulatingIncidence { classes: ids } => ids
                .iter()
                .map(|&c| classes[c].arrivals_accumulated() as f64)
                .sum(),
            StatSource::Prevalence { classes: ids } => {
                ids.iter().map(|&c| classes[c].count() as f64).sum()
            }
        };
        match self.source {
            // Incidence accumulates across the period; level readings track
            // the latest value.
            StatSource::Incidence { .. } => self.period_value += self.current_value,
            StatSource::AccumulatingIncidence { .. } | StatSource::Prevalence { .. } => {
                self.period_value = self.current_value
            }
        }
    }

    /// Close the current observation period, recording its value
    pub fn close_period(&mut self) {
        self.recorded_periods.push(self.period_value);
        if matches!(self.source, StatSource::Incidence { .. }) {
            self.period_value = 0.0;
        }
    }

    /// Zero all mutable state (trajectory start and warm-up end)
    pub fn reset(&mut self) {
        self.current_value = 0.0;
        self.period_value = 0.0;
        self.recorded_periods.clear();
    }
}

/// Which reading of the underlying summation statistics a ratio combines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatioKind {
    /// Ratio of the per-Δt values
    CurrentOverCurrent,
    /// Ratio of the per-observation-period recorded values
    PeriodOverPeriod,
}

/// A ratio of two summation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioStatistic {
    id: RatioStatId,
    name: String,
    numerator: StatId,
    denominator: StatId,
    kind: RatioKind,
    surveillance_delay_periods: usize,
    calibration: Option<CalibrationTarget>,

    // Mutable per-trajectory state
    current_value: f64,
    recorded_periods: Vec<f64>,
}

impl RatioStatistic {
    pub fn new(
        id: RatioStatId,
        name: impl Into<String>,
        numerator: StatId,
        denominator: StatId,
        kind: RatioKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            numerator,
            denominator,
            kind,
            surveillance_delay_periods: 0,
            calibration: None,
            current_value: RATIO_UNDEFINED,
            recorded_periods: Vec::new(),
        }
    }

    pub fn with_surveillance_delay(mut self, periods: usize) -> Self {
        self.surveillance_delay_periods = periods;
        self
    }

    pub fn with_calibration(mut self, target: CalibrationTarget) -> Self {
        self.calibration = Some(target);
        self
    }

    pub fn id(&self) -> RatioStatId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn numerator(&self) -> StatId {
        self.numerator
    }

    pub fn denominator(&self) -> StatId {
        self.denominator
    }

    pub fn calibration(&self) -> Option<&CalibrationTarget> {
        self.calibration.as_ref()
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn last_recorded(&self) -> Option<f64> {
        self.recorded_periods.last().copied()
    }

    /// Observed reading, lagged by the surveillance delay
    pub fn observed(&self) -> Option<f64> {
        let n = self.recorded_periods.len();
        if n > self.surveillance_delay_periods {
            Some(self.recorded_periods[n - 1 - self.surveillance_delay_periods])
        } else {
            None
        }
    }

    fn divide(num: f64, den: f64) -> f64 {
        if den == 0.0 {
            RATIO_UNDEFINED
        } else {
            num / den
        }
    }

    /// Recompute from already-updated summation statistics
    ///
    /// Must run after every referenced summation statistic's `update` for the
    /// same Δt.
    pub fn update(&mut self, summations: &[SummationStatistic]) {
        if self.kind == RatioKind::CurrentOverCurrent {
            self.current_value = Self::divide(
                summations[self.numerator].current_value(),
                summations[self.denominator].current_value(),
            );
        }
    }

    /// Close the current observation period using the just-recorded period
    /// values of the underlying summation statistics
    pub fn close_period(&mut self, summations: &[SummationStatistic]) {
        let value = match self.kind {
            RatioKind::CurrentOverCurrent => self.current_value,
            RatioKind::PeriodOverPeriod => Self::divide(
                summations[self.numerator].last_recorded().unwrap_or(0.0),
                summations[self.denominator].last_recorded().unwrap_or(0.0),
            ),
        };
        if self.kind == RatioKind::PeriodOverPeriod {
            self.current_value = value;
        }
        self.recorded_periods.push(value);
    }

    /// Zero all mutable state (trajectory start and warm-up end)
    pub fn reset(&mut self) {
        self.current_value = RATIO_UNDEFINED;
        self.recorded_periods.clear();
    }
}
