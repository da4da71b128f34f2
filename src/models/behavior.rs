use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw signals read from the OS by a `BehaviorSampler`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySample {
    pub at: DateTime<Utc>,
    pub active_app: Option<String>,
    pub window_count: u32,
    pub idle_secs: f64,
    /// Notifications delivered since the previous sample.
    pub notification_count: u32,
    /// Frontmost-app changes the sampler saw since the previous sample.
    #[serde(default)]
    pub app_switches: u32,
}

/// Snapshot of behavioral load, recomputed every cycle. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorMetrics {
    pub switches_per_minute: f64,
    pub session_duration_secs: f64,
    pub focus_fractions: BTreeMap<String, f64>,
    pub notification_count: u32,
    pub recent_apps: Vec<String>,
    pub window_count: u32,
    pub idle_secs: f64,
}

impl BehaviorMetrics {
    pub fn max_focus_fraction(&self) -> f64 {
        self.focus_fractions
            .values()
            .copied()
            .fold(0.0_f64, f64::max)
    }

    /// App holding the largest focus share; ties resolve to the
    /// lexicographically first name.
    pub fn dominant_app(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (app, fraction) in &self.focus_fractions {
            match best {
                Some((_, current)) if *fraction <= current => {}
                _ => best = Some((app.as_str(), *fraction)),
            }
        }
        best.map(|(app, _)| app)
    }
}
