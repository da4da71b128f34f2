use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, to_hour},
};
use crate::models::{ActiveHours, Preferences};

impl Database {
    /// The single preferences row; defaults when it was never written.
    pub async fn get_preferences(&self) -> Result<Preferences> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT active_start_hour, active_end_hour, preferred_practices_json, baseline_json
                     FROM preferences WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, Option<i64>>(0)?,
                            row.get::<_, Option<i64>>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((start, end, practices_json, baseline_json)) = row else {
                return Ok(Preferences::default());
            };

            let active_hours = match (
                to_hour(start, "active_start_hour")?,
                to_hour(end, "active_end_hour")?,
            ) {
                (Some(start), Some(end)) => Some(ActiveHours::new(start, end)),
                _ => None,
            };

            Ok(Preferences {
                active_hours,
                preferred_practices: serde_json::from_str(&practices_json)
                    .context("failed to parse preferred_practices_json")?,
                baseline_json,
            })
        })
        .await
    }

    /// Sets the active-hours window, leaving the other preference columns alone.
    pub async fn update_active_hours(&self, hours: Option<ActiveHours>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO preferences (id, active_start_hour, active_end_hour, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     active_start_hour = excluded.active_start_hour,
                     active_end_hour = excluded.active_end_hour,
                     updated_at = excluded.updated_at",
                params![
                    hours.map(|hours| hours.start_hour),
                    hours.map(|hours| hours.end_hour),
                    format_datetime(&Utc::now()),
                ],
            )
            .with_context(|| "failed to save active hours")?;
            Ok(())
        })
        .await
    }

    pub async fn update_preferred_practices(&self, practices: &[String]) -> Result<()> {
        let practices_json =
            serde_json::to_string(practices).context("failed to serialize preferred practices")?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO preferences (id, preferred_practices_json, updated_at)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     preferred_practices_json = excluded.preferred_practices_json,
                     updated_at = excluded.updated_at",
                params![practices_json, format_datetime(&Utc::now())],
            )
            .with_context(|| "failed to save preferred practices")?;
            Ok(())
        })
        .await
    }

    pub async fn update_baseline_json(&self, baseline_json: &str) -> Result<()> {
        let baseline_json = baseline_json.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO preferences (id, baseline_json, updated_at)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     baseline_json = excluded.baseline_json,
                     updated_at = excluded.updated_at",
                params![baseline_json, format_datetime(&Utc::now())],
            )
            .with_context(|| "failed to save baseline snapshot")?;
            Ok(())
        })
        .await
    }
}
