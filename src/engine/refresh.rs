//! Rebuilds the derived aggregates from store history.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::warn;

use super::inputs::PendingInputs;
use crate::db::EventStore;
use crate::models::ToolContext;
use crate::ranker;
use crate::settings::EngineConfig;
use crate::suppression::LearnedPatterns;

/// One consistent rebuild of everything derived from history.
#[derive(Debug, Clone)]
pub struct Aggregates {
    pub patterns: Arc<LearnedPatterns>,
    pub preferred_practices: Arc<Vec<String>>,
    pub tool_context: Arc<ToolContext>,
}

impl Aggregates {
    pub fn into_pending(self) -> PendingInputs {
        PendingInputs {
            patterns: Some(self.patterns),
            preferred_practices: Some(self.preferred_practices),
            tool_context: Some(self.tool_context),
            active_hours: None,
        }
    }
}

/// Reads history and recomputes patterns, ranking and tool context.
///
/// A failed read counts as empty history. The ranked list is cached in the
/// preferences row when it changed.
pub async fn rebuild_aggregates(
    store: &dyn EventStore,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Aggregates {
    let since = now - Duration::days(config.history_lookback_days);

    let sessions = store.practices().await.unwrap_or_else(|err| {
        warn!("practice history unavailable, treating as empty: {err:#}");
        Vec::new()
    });
    let entries = store.entries_since(Some(since), None).await.unwrap_or_else(|err| {
        warn!("weather history unavailable, treating as empty: {err:#}");
        Vec::new()
    });
    let dismissals = store.dismissals_since(Some(since)).await.unwrap_or_else(|err| {
        warn!("dismissal history unavailable, treating as empty: {err:#}");
        Vec::new()
    });

    let preferences = match store.load_preferences().await {
        Ok(preferences) => Some(preferences),
        Err(err) => {
            warn!("preferences unavailable: {err:#}");
            None
        }
    };

    let mut preferred = ranker::rank(&sessions);
    // Practices the user listed but never tried keep their place after the proven ones.
    if let Some(prefs) = &preferences {
        for practice in &prefs.preferred_practices {
            if !preferred.contains(practice) {
                preferred.push(practice.clone());
            }
        }
    }

    if let Some(prefs) = preferences {
        if prefs.preferred_practices != preferred {
            if let Err(err) = store.save_preferred_practices(&preferred).await {
                warn!("failed to cache practice ranking: {err:#}");
            }
        }
    }

    let patterns = LearnedPatterns::build(&dismissals, &entries, now);
    let tool_context = ToolContext::build(&sessions, &entries, preferred.clone(), now);

    Aggregates {
        patterns: Arc::new(patterns),
        preferred_practices: Arc::new(preferred),
        tool_context: Arc::new(tool_context),
    }
}
