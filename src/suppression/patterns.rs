//! Learned dismissal patterns.
//!
//! Built from the store's nudge and dismissal history and swapped in whole;
//! nothing mutates a `LearnedPatterns` after `build`.

use std::collections::HashMap;

use chrono::{DateTime, Local, Timelike, Utc};
use serde::Serialize;

use crate::models::{DismissalEvent, StressEntry, Weather};

const UNKNOWN_APP: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub app: String,
    /// Local hour of day, 0-23.
    pub hour: u32,
    pub weather: Weather,
}

impl BucketKey {
    pub fn new(app: Option<&str>, hour: u32, weather: Weather) -> Self {
        Self {
            app: app.unwrap_or(UNKNOWN_APP).to_string(),
            hour,
            weather,
        }
    }

    fn at(app: Option<&str>, timestamp: DateTime<Utc>, weather: Weather) -> Self {
        Self::new(app, timestamp.with_timezone(&Local).hour(), weather)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    pub nudges: u32,
    pub dismissals: u32,
    /// Mean baseline deviation of the nudges issued in this bucket.
    pub mean_deviation: f64,
}

impl BucketStats {
    /// Dismissals over nudges. Dismissals older than the nudge history still
    /// count, so the denominator never drops below the dismissal count.
    pub fn dismissal_rate(&self) -> f64 {
        let denominator = self.nudges.max(self.dismissals);
        if denominator == 0 {
            return 0.0;
        }
        f64::from(self.dismissals) / f64::from(denominator)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    nudges: u32,
    dismissals: u32,
    nudge_deviation: f64,
    dismissal_deviation: f64,
    dismissal_deviation_samples: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LearnedPatterns {
    buckets: HashMap<BucketKey, BucketStats>,
    pub built_at: Option<DateTime<Utc>>,
}

impl LearnedPatterns {
    pub fn build(
        dismissals: &[DismissalEvent],
        entries: &[StressEntry],
        built_at: DateTime<Utc>,
    ) -> Self {
        let mut acc: HashMap<BucketKey, Accumulator> = HashMap::new();

        for entry in entries.iter().filter(|entry| entry.carried_nudge()) {
            let slot = acc
                .entry(BucketKey::at(entry.active_app.as_deref(), entry.timestamp, entry.weather))
                .or_default();
            slot.nudges += 1;
            slot.nudge_deviation += entry.deviation;
        }

        for event in dismissals {
            let slot = acc
                .entry(BucketKey::at(
                    event.active_app.as_deref(),
                    event.attributed_at(),
                    event.weather,
                ))
                .or_default();
            slot.dismissals += 1;
            if let Some(deviation) = event.deviation.filter(|d| d.is_finite()) {
                slot.dismissal_deviation += deviation;
                slot.dismissal_deviation_samples += 1;
            }
        }

        let buckets = acc
            .into_iter()
            .map(|(key, slot)| {
                let mean_deviation = if slot.nudges > 0 {
                    slot.nudge_deviation / f64::from(slot.nudges)
                } else if slot.dismissal_deviation_samples > 0 {
                    slot.dismissal_deviation / f64::from(slot.dismissal_deviation_samples)
                } else {
                    0.0
                };
                let stats = BucketStats {
                    nudges: slot.nudges,
                    dismissals: slot.dismissals,
                    mean_deviation,
                };
                (key, stats)
            })
            .collect();

        Self {
            buckets,
            built_at: Some(built_at),
        }
    }

    pub fn bucket(&self, app: Option<&str>, hour: u32, weather: Weather) -> Option<&BucketStats> {
        self.buckets.get(&BucketKey::new(app, hour, weather))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
