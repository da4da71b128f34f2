//! User reactions flowing back into history.
//!
//! Each entry point writes one record and marks the derived aggregates
//! stale, so the next cycle decides with the updated patterns and ranking.

use chrono::Utc;
use log::info;
use uuid::Uuid;

use super::controller::MonitoringLoop;
use crate::errors::AgentError;
use crate::models::{
    CloseOutcome, DismissalEvent, DismissalType, IssuedNudge, PracticeClose, PracticeSession,
    Weather,
};

impl MonitoringLoop {
    pub async fn record_dismissal(
        &self,
        nudge: &IssuedNudge,
        dismissal_type: DismissalType,
    ) -> Result<DismissalEvent, AgentError> {
        let event = DismissalEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            weather: nudge.weather,
            dismissal_type,
            active_app: nudge.active_app.clone(),
            deviation: Some(nudge.deviation),
            nudge_issued_at: Some(nudge.issued_at),
        };
        self.store
            .append_dismissal(&event)
            .await
            .map_err(AgentError::store)?;

        info!(
            "nudge {} {} in {}",
            nudge.nudge.nudge_type,
            dismissal_type.as_str(),
            nudge.active_app.as_deref().unwrap_or("unknown app")
        );
        self.request_refresh();
        Ok(event)
    }

    pub async fn start_practice(
        &self,
        practice_id: &str,
        weather_before: Weather,
    ) -> Result<PracticeSession, AgentError> {
        let session = PracticeSession::start(practice_id, weather_before, Utc::now());
        self.store
            .append_practice(&session)
            .await
            .map_err(AgentError::store)?;
        Ok(session)
    }

    /// Closes a practice session. A session is closed at most once; a second
    /// attempt is rejected and leaves the stored outcome untouched.
    pub async fn finish_practice(
        &self,
        session_id: &str,
        weather_after: Option<Weather>,
        completed: bool,
        what_helped: Option<String>,
    ) -> Result<PracticeSession, AgentError> {
        let close = PracticeClose {
            weather_after,
            was_completed: completed,
            what_helped: what_helped.filter(|text| !text.trim().is_empty()),
            ended_at: Utc::now(),
        };

        match self
            .store
            .close_practice(session_id, close)
            .await
            .map_err(AgentError::store)?
        {
            CloseOutcome::Closed(session) => {
                self.request_refresh();
                Ok(session)
            }
            CloseOutcome::AlreadyClosed(_) => {
                Err(AgentError::PracticeAlreadyClosed(session_id.to_string()))
            }
            CloseOutcome::NotFound => Err(AgentError::UnknownPractice(session_id.to_string())),
        }
    }
}
