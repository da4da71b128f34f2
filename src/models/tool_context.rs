//! Context bundle handed to the vision classifier with every frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PracticeSession, StressEntry};

/// Number of most recent records of each kind serialized into the context.
pub const CONTEXT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolContext {
    /// JSON array of recent practice sessions.
    pub practice_history: String,
    /// JSON array of recent weather readings.
    pub weather_history: String,
    pub preferred_practices: Vec<String>,
    pub built_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PracticeSummary<'a> {
    practice_id: &'a str,
    started_at: String,
    weather_before: &'static str,
    weather_after: Option<&'static str>,
    completed: bool,
    what_helped: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeatherSummary<'a> {
    timestamp: String,
    weather: &'static str,
    confidence: f64,
    signals: &'a [String],
    nudged: bool,
}

impl ToolContext {
    /// Builds the context from histories sorted ascending by time.
    pub fn build(
        sessions: &[PracticeSession],
        entries: &[StressEntry],
        preferred_practices: Vec<String>,
        built_at: DateTime<Utc>,
    ) -> Self {
        let practices: Vec<PracticeSummary<'_>> = tail(sessions)
            .iter()
            .map(|session| PracticeSummary {
                practice_id: &session.practice_id,
                started_at: session.started_at.to_rfc3339(),
                weather_before: session.weather_before.as_str(),
                weather_after: session.weather_after.map(|w| w.as_str()),
                completed: session.was_completed,
                what_helped: session.what_helped.as_deref(),
            })
            .collect();

        let weather: Vec<WeatherSummary<'_>> = tail(entries)
            .iter()
            .map(|entry| WeatherSummary {
                timestamp: entry.timestamp.to_rfc3339(),
                weather: entry.weather.as_str(),
                confidence: entry.confidence,
                signals: &entry.signals,
                nudged: entry.carried_nudge(),
            })
            .collect();

        Self {
            practice_history: serde_json::to_string(&practices).unwrap_or_else(|_| "[]".into()),
            weather_history: serde_json::to_string(&weather).unwrap_or_else(|_| "[]".into()),
            preferred_practices,
            built_at: Some(built_at),
        }
    }
}

fn tail<T>(items: &[T]) -> &[T] {
    &items[items.len().saturating_sub(CONTEXT_HISTORY_LIMIT)..]
}
