use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_datetime, parse_optional_datetime, parse_optional_weather,
        parse_weather,
    },
};
use crate::models::{CloseOutcome, PracticeClose, PracticeSession};

const SESSION_COLUMNS: &str = "id, practice_id, started_at, weather_before, weather_after,
     was_completed, what_helped, ended_at";

fn row_to_session(row: &Row) -> Result<PracticeSession> {
    let started_at: String = row.get("started_at")?;
    let weather_before: String = row.get("weather_before")?;
    let weather_after: Option<String> = row.get("weather_after")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let was_completed: i64 = row.get("was_completed")?;

    Ok(PracticeSession {
        id: row.get("id")?,
        practice_id: row.get("practice_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        weather_before: parse_weather(&weather_before, "weather_before")?,
        weather_after: parse_optional_weather(weather_after, "weather_after")?,
        was_completed: was_completed != 0,
        what_helped: row.get("what_helped")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
    })
}

fn find_session(conn: &Connection, session_id: &str) -> Result<Option<PracticeSession>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM practice_sessions WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

impl Database {
    pub async fn insert_practice_session(&self, session: &PracticeSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO practice_sessions (
                    id, practice_id, started_at, weather_before, weather_after,
                    was_completed, what_helped, ended_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.practice_id,
                    format_datetime(&record.started_at),
                    record.weather_before.as_str(),
                    record.weather_after.map(|w| w.as_str()),
                    record.was_completed,
                    record.what_helped,
                    record.ended_at.as_ref().map(format_datetime),
                ],
            )
            .with_context(|| "failed to insert practice session")?;
            Ok(())
        })
        .await
    }

    /// Closes a session exactly once. A second close leaves the row untouched.
    pub async fn close_practice_session(
        &self,
        session_id: &str,
        close: PracticeClose,
    ) -> Result<CloseOutcome> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let Some(existing) = find_session(conn, &session_id)? else {
                return Ok(CloseOutcome::NotFound);
            };
            if !existing.is_open() {
                return Ok(CloseOutcome::AlreadyClosed(existing));
            }

            conn.execute(
                "UPDATE practice_sessions
                 SET weather_after = ?1,
                     was_completed = ?2,
                     what_helped = ?3,
                     ended_at = ?4
                 WHERE id = ?5 AND ended_at IS NULL",
                params![
                    close.weather_after.map(|w| w.as_str()),
                    close.was_completed,
                    close.what_helped,
                    format_datetime(&close.ended_at),
                    session_id,
                ],
            )
            .with_context(|| "failed to close practice session")?;

            let updated = find_session(conn, &session_id)?
                .context("practice session vanished while closing")?;
            Ok(CloseOutcome::Closed(updated))
        })
        .await
    }

    pub async fn get_practice_sessions(&self) -> Result<Vec<PracticeSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM practice_sessions ORDER BY started_at ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Marks sessions left open before `cutoff` (app quit mid-practice) as
    /// ended without completion. Their weather-after stays unset.
    pub async fn abandon_stale_practice_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            let updated = conn
                .execute(
                    "UPDATE practice_sessions
                     SET ended_at = ?1, was_completed = 0
                     WHERE ended_at IS NULL AND started_at < ?2",
                    params![now, format_datetime(&cutoff)],
                )
                .with_context(|| "failed to abandon stale practice sessions")?;
            Ok(updated)
        })
        .await
    }
}
