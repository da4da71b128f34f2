use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{DismissalType, Weather};

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_weather(value: &str, field: &str) -> Result<Weather> {
    Weather::from_label(value).ok_or_else(|| anyhow!("unknown weather '{value}' in {field}"))
}

pub fn parse_optional_weather(value: Option<String>, field: &str) -> Result<Option<Weather>> {
    value.map(|raw| parse_weather(&raw, field)).transpose()
}

pub fn parse_dismissal_type(value: &str) -> Result<DismissalType> {
    DismissalType::from_label(value).ok_or_else(|| anyhow!("unknown dismissal type {value}"))
}

pub fn to_hour(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value
        .map(|raw| {
            u32::try_from(raw)
                .ok()
                .filter(|hour| *hour < 24)
                .ok_or_else(|| anyhow!("{field} contains invalid hour {raw}"))
        })
        .transpose()
}
