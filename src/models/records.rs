//! Append-only records owned by the event store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Weather;

/// One classification result. Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StressEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub weather: Weather,
    pub confidence: f64,
    pub signals: Vec<String>,
    pub nudge_type: Option<String>,
    pub nudge_message: Option<String>,
    pub active_app: Option<String>,
    pub deviation: f64,
    pub thinking: Option<String>,
}

impl StressEntry {
    pub fn carried_nudge(&self) -> bool {
        self.nudge_type.is_some()
    }
}

/// One attempted coping exercise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    pub practice_id: String,
    pub started_at: DateTime<Utc>,
    pub weather_before: Weather,
    pub weather_after: Option<Weather>,
    pub was_completed: bool,
    pub what_helped: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PracticeSession {
    pub fn start(practice_id: impl Into<String>, weather_before: Weather, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            practice_id: practice_id.into(),
            started_at: at,
            weather_before,
            weather_after: None,
            was_completed: false,
            what_helped: None,
            ended_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Ordinal weather improvement, positive when the user ended calmer.
    pub fn improvement(&self) -> Option<i32> {
        self.weather_after
            .map(|after| self.weather_before.ordinal() - after.ordinal())
    }
}

/// How a session is closed. Applied at most once per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeClose {
    pub weather_after: Option<Weather>,
    pub was_completed: bool,
    pub what_helped: Option<String>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(PracticeSession),
    AlreadyClosed(PracticeSession),
    NotFound,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DismissalType {
    Dismissed,
    Ignored,
    Snoozed,
    NotNow,
}

impl DismissalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DismissalType::Dismissed => "dismissed",
            DismissalType::Ignored => "ignored",
            DismissalType::Snoozed => "snoozed",
            DismissalType::NotNow => "not_now",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "dismissed" => Some(DismissalType::Dismissed),
            "ignored" => Some(DismissalType::Ignored),
            "snoozed" => Some(DismissalType::Snoozed),
            "not_now" => Some(DismissalType::NotNow),
            _ => None,
        }
    }
}

/// A nudge the user declined or ignored. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DismissalEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub weather: Weather,
    pub dismissal_type: DismissalType,
    pub active_app: Option<String>,
    /// Baseline deviation at the time the dismissed nudge was issued.
    pub deviation: Option<f64>,
    pub nudge_issued_at: Option<DateTime<Utc>>,
}

impl DismissalEvent {
    /// When the dismissed nudge was shown; falls back to the dismissal time
    /// for events recorded without it.
    pub fn attributed_at(&self) -> DateTime<Utc> {
        self.nudge_issued_at.unwrap_or(self.timestamp)
    }
}
