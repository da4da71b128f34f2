use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage timings of one completed cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    /// Terminal outcome label: `nudged`, `silenced` or `skipped:<reason>`.
    pub outcome: String,
    pub sample_ms: u64,
    pub capture_ms: Option<u64>,
    pub frame_bytes: usize,
    pub classify_ms: Option<u64>,
    pub classify_attempts: u32,
    pub store_ms: Option<u64>,
    pub total_ms: u64,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_cycles: Vec<CycleMetrics>,
    pub cycle_count: u64,
    /// Completed cycles per outcome kind (`nudged`, `silenced`, `skipped`).
    pub outcome_counts: BTreeMap<String, u64>,
}
