use serde::{Deserialize, Serialize};

/// Ordinal stress classification: clear (calm), cloudy (moderate), stormy (high).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Weather {
    Clear,
    Cloudy,
    Stormy,
}

impl Weather {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Cloudy => "cloudy",
            Weather::Stormy => "stormy",
        }
    }

    /// Position on the stress scale; stormy→clear is a distance of 2.
    pub fn ordinal(&self) -> i32 {
        match self {
            Weather::Clear => 0,
            Weather::Cloudy => 1,
            Weather::Stormy => 2,
        }
    }

    /// Lenient parse of classifier and database labels.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clear" | "calm" | "sunny" => Some(Weather::Clear),
            "cloudy" | "moderate" => Some(Weather::Cloudy),
            "stormy" | "storm" | "high" => Some(Weather::Stormy),
            _ => None,
        }
    }
}
