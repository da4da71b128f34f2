//! Nudges, effort levels and silence decisions.
//!
//! A cycle that warranted a nudge ends in exactly one of: an issued nudge
//! (`IssuedNudge`) or a `SilenceDecision`. Silence decisions are transient and
//! only ever travel to the UI sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Weather;

/// Estimated cost of interrupting the user. Ordered `Low < High < Max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EffortLevel {
    Low,
    High,
    Max,
}

impl EffortLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffortLevel::Low => "low",
            EffortLevel::High => "high",
            EffortLevel::Max => "max",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "minimal" => Some(EffortLevel::Low),
            "high" | "medium" => Some(EffortLevel::High),
            "max" | "maximum" => Some(EffortLevel::Max),
            _ => None,
        }
    }
}

/// A user-facing suggestion to perform a coping practice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Nudge {
    pub nudge_type: String,
    pub message: String,
    /// Practice the nudge points at, if any.
    pub practice_id: Option<String>,
}

/// A nudge that reached the user, with the context needed to attribute a
/// later dismissal to the right bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedNudge {
    pub nudge: Nudge,
    pub effort: EffortLevel,
    pub weather: Weather,
    pub active_app: Option<String>,
    pub deviation: f64,
    pub issued_at: DateTime<Utc>,
}

/// Which suppression rule fired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SilenceReason {
    OutsideActiveHours,
    RecentlyInterrupted,
    LearnedDismissalPattern,
}

impl SilenceReason {
    pub fn label(&self) -> &'static str {
        match self {
            SilenceReason::OutsideActiveHours => "outside active hours",
            SilenceReason::RecentlyInterrupted => "recently interrupted",
            SilenceReason::LearnedDismissalPattern => "usually dismissed in this context",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SilenceDecision {
    pub id: String,
    pub reason: SilenceReason,
    pub rationale: String,
    pub effort: EffortLevel,
    pub weather: Weather,
    pub timestamp: DateTime<Utc>,
}
