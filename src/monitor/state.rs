use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{IssuedNudge, SilenceDecision, Weather};

/// The single published view of the monitor. Replaced whole on every
/// update; `version` increases by one per publish.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub version: u64,
    pub weather: Option<Weather>,
    pub monitoring_active: bool,
    /// Cause of the last degraded cycle or dropped write, cleared by the next
    /// clean cycle.
    pub diagnostic: Option<String>,
    pub last_silence: Option<SilenceDecision>,
    pub last_nudge: Option<IssuedNudge>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
    pub cycles_completed: u64,
}
