//! Store seam used by the engine. The SQLite `Database` is the shipped
//! implementation; the engine only relies on append, sorted fetch and the
//! field-scoped preferences updates.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::connection::Database;
use crate::models::{
    ActiveHours, CloseOutcome, DismissalEvent, PracticeClose, PracticeSession, Preferences,
    StressEntry,
};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_entry(&self, entry: &StressEntry) -> Result<()>;

    /// Oldest first; `limit` keeps the most recent entries.
    async fn entries_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<StressEntry>>;

    async fn append_practice(&self, session: &PracticeSession) -> Result<()>;

    async fn close_practice(&self, session_id: &str, close: PracticeClose) -> Result<CloseOutcome>;

    /// Oldest first by start time.
    async fn practices(&self) -> Result<Vec<PracticeSession>>;

    async fn append_dismissal(&self, event: &DismissalEvent) -> Result<()>;

    async fn dismissals_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<DismissalEvent>>;

    async fn load_preferences(&self) -> Result<Preferences>;

    // Each save touches one field of the preferences row, so writers of
    // different fields never overwrite each other.
    async fn save_active_hours(&self, hours: Option<ActiveHours>) -> Result<()>;

    async fn save_preferred_practices(&self, practices: &[String]) -> Result<()>;

    async fn save_baseline(&self, baseline_json: &str) -> Result<()>;
}

#[async_trait]
impl EventStore for Database {
    async fn append_entry(&self, entry: &StressEntry) -> Result<()> {
        self.insert_stress_entry(entry).await
    }

    async fn entries_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<StressEntry>> {
        self.get_stress_entries(since, limit).await
    }

    async fn append_practice(&self, session: &PracticeSession) -> Result<()> {
        self.insert_practice_session(session).await
    }

    async fn close_practice(&self, session_id: &str, close: PracticeClose) -> Result<CloseOutcome> {
        self.close_practice_session(session_id, close).await
    }

    async fn practices(&self) -> Result<Vec<PracticeSession>> {
        self.get_practice_sessions().await
    }

    async fn append_dismissal(&self, event: &DismissalEvent) -> Result<()> {
        self.insert_dismissal(event).await
    }

    async fn dismissals_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<DismissalEvent>> {
        self.get_dismissals(since).await
    }

    async fn load_preferences(&self) -> Result<Preferences> {
        self.get_preferences().await
    }

    async fn save_active_hours(&self, hours: Option<ActiveHours>) -> Result<()> {
        self.update_active_hours(hours).await
    }

    async fn save_preferred_practices(&self, practices: &[String]) -> Result<()> {
        self.update_preferred_practices(practices).await
    }

    async fn save_baseline(&self, baseline_json: &str) -> Result<()> {
        self.update_baseline_json(baseline_json).await
    }
}
