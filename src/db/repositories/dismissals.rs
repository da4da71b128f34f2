use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_datetime, parse_dismissal_type, parse_optional_datetime,
        parse_weather,
    },
};
use crate::models::DismissalEvent;

fn row_to_dismissal(row: &Row) -> Result<DismissalEvent> {
    let timestamp: String = row.get("timestamp")?;
    let weather: String = row.get("weather")?;
    let dismissal_type: String = row.get("dismissal_type")?;
    let nudge_issued_at: Option<String> = row.get("nudge_issued_at")?;

    Ok(DismissalEvent {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        weather: parse_weather(&weather, "weather")?,
        dismissal_type: parse_dismissal_type(&dismissal_type)?,
        active_app: row.get("active_app")?,
        deviation: row.get("deviation")?,
        nudge_issued_at: parse_optional_datetime(nudge_issued_at, "nudge_issued_at")?,
    })
}

impl Database {
    pub async fn insert_dismissal(&self, event: &DismissalEvent) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO dismissal_events (
                    id, timestamp, weather, dismissal_type, active_app, deviation, nudge_issued_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    format_datetime(&record.timestamp),
                    record.weather.as_str(),
                    record.dismissal_type.as_str(),
                    record.active_app,
                    record.deviation,
                    record.nudge_issued_at.as_ref().map(format_datetime),
                ],
            )
            .with_context(|| "failed to insert dismissal event")?;
            Ok(())
        })
        .await
    }

    pub async fn get_dismissals(&self, since: Option<DateTime<Utc>>) -> Result<Vec<DismissalEvent>> {
        let since = since.map(|dt| format_datetime(&dt));
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, weather, dismissal_type, active_app, deviation, nudge_issued_at
                 FROM dismissal_events
                 WHERE ?1 IS NULL OR timestamp >= ?1
                 ORDER BY timestamp ASC",
            )?;
            let mut rows = stmt.query(params![since])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_dismissal(row)?);
            }
            Ok(events)
        })
        .await
    }
}
