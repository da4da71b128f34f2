use serde::{Deserialize, Serialize};

/// Local-time window in which nudges may be shown. `start_hour == end_hour`
/// means the whole day; `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ActiveHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        let hour = hour % 24;
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Single-row user preferences record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub active_hours: Option<ActiveHours>,
    pub preferred_practices: Vec<String>,
    pub baseline_json: Option<String>,
}
