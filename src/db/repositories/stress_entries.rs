use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_weather, to_i64},
};
use crate::models::StressEntry;

fn row_to_entry(row: &Row) -> Result<StressEntry> {
    let timestamp: String = row.get("timestamp")?;
    let weather: String = row.get("weather")?;
    let signals_json: String = row.get("signals_json")?;

    Ok(StressEntry {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        weather: parse_weather(&weather, "weather")?,
        confidence: row.get("confidence")?,
        signals: serde_json::from_str(&signals_json).context("failed to parse signals_json")?,
        nudge_type: row.get("nudge_type")?,
        nudge_message: row.get("nudge_message")?,
        active_app: row.get("active_app")?,
        deviation: row.get("deviation")?,
        thinking: row.get("thinking")?,
    })
}

impl Database {
    pub async fn insert_stress_entry(&self, entry: &StressEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            let signals_json =
                serde_json::to_string(&record.signals).context("failed to serialize signals")?;
            conn.execute(
                "INSERT INTO stress_entries (
                    id, timestamp, weather, confidence, signals_json,
                    nudge_type, nudge_message, active_app, deviation, thinking
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    format_datetime(&record.timestamp),
                    record.weather.as_str(),
                    record.confidence,
                    signals_json,
                    record.nudge_type,
                    record.nudge_message,
                    record.active_app,
                    record.deviation,
                    record.thinking,
                ],
            )
            .with_context(|| "failed to insert stress entry")?;
            Ok(())
        })
        .await
    }

    /// Entries at or after `since`, oldest first. With a `limit`, only the most
    /// recent `limit` entries are returned (still oldest first).
    pub async fn get_stress_entries(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<StressEntry>> {
        let since = since.map(|dt| format_datetime(&dt));
        let limit = limit.map(to_i64).transpose()?.unwrap_or(-1);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM (
                    SELECT id, timestamp, weather, confidence, signals_json,
                           nudge_type, nudge_message, active_app, deviation, thinking
                    FROM stress_entries
                    WHERE ?1 IS NULL OR timestamp >= ?1
                    ORDER BY timestamp DESC
                    LIMIT ?2
                 )
                 ORDER BY timestamp ASC",
            )?;

            let mut rows = stmt.query(params![since, limit])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}
