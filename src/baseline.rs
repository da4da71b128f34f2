//! Rolling behavioral baseline
//!
//! Exponentially weighted mean and variance per metric. Every observation
//! folds into the baseline, including ones whose cycle ends up suppressed or
//! skipped further down the pipeline.

use serde::{Deserialize, Serialize};

use crate::models::BehaviorMetrics;

/// Weight of the newest observation in the moving statistics.
pub const DEFAULT_SMOOTHING: f64 = 0.2;

/// Observations needed before deviation is reported; before that it is 0.
pub const MIN_OBSERVATIONS: u32 = 3;

const WEIGHT_SWITCH_RATE: f64 = 0.5;
const WEIGHT_SESSION: f64 = 0.2;
const WEIGHT_FOCUS: f64 = 0.3;

// Spread floors keep a flat history from turning tiny wiggles into huge scores.
const FLOOR_SWITCH_RATE: f64 = 0.5;
const FLOOR_SESSION_MINUTES: f64 = 5.0;
const FLOOR_FOCUS: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
struct RollingStat {
    mean: f64,
    variance: f64,
}

impl RollingStat {
    fn fold(&mut self, value: f64, alpha: f64, first: bool) {
        if first {
            self.mean = value;
            self.variance = 0.0;
            return;
        }
        let diff = value - self.mean;
        let increment = alpha * diff;
        self.mean += increment;
        self.variance = (1.0 - alpha) * (self.variance + diff * increment);
    }

    fn distance(&self, value: f64, floor: f64) -> f64 {
        let spread = self.variance.max(0.0).sqrt().max(floor);
        (value - self.mean).abs() / spread
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineTracker {
    switch_rate: RollingStat,
    session_minutes: RollingStat,
    focus: RollingStat,
    observations: u32,
    smoothing: f64,
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl BaselineTracker {
    pub fn new(smoothing: f64) -> Self {
        let smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.01, 1.0)
        } else {
            DEFAULT_SMOOTHING
        };
        Self {
            switch_rate: RollingStat::default(),
            session_minutes: RollingStat::default(),
            focus: RollingStat::default(),
            observations: 0,
            smoothing,
        }
    }

    /// Scores `metrics` against the baseline as it stood before this sample,
    /// then folds the sample in. Never fails; returns a finite value >= 0.
    pub fn observe(&mut self, metrics: &BehaviorMetrics) -> f64 {
        let switch_rate = finite_or(metrics.switches_per_minute, self.switch_rate.mean);
        let session_minutes = finite_or(metrics.session_duration_secs / 60.0, self.session_minutes.mean);
        let focus = finite_or(metrics.max_focus_fraction(), self.focus.mean);

        let deviation = if self.observations >= MIN_OBSERVATIONS {
            WEIGHT_SWITCH_RATE * self.switch_rate.distance(switch_rate, FLOOR_SWITCH_RATE)
                + WEIGHT_SESSION * self.session_minutes.distance(session_minutes, FLOOR_SESSION_MINUTES)
                + WEIGHT_FOCUS * self.focus.distance(focus, FLOOR_FOCUS)
        } else {
            0.0
        };

        let first = self.observations == 0;
        self.switch_rate.fold(switch_rate, self.smoothing, first);
        self.session_minutes.fold(session_minutes, self.smoothing, first);
        self.focus.fold(focus, self.smoothing, first);
        self.observations = self.observations.saturating_add(1);

        if deviation.is_finite() {
            deviation.max(0.0)
        } else {
            0.0
        }
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }

    pub fn is_warm(&self) -> bool {
        self.observations >= MIN_OBSERVATIONS
    }

    pub fn mean_switch_rate(&self) -> f64 {
        self.switch_rate.mean
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
