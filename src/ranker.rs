//! Orders practices by how well they have worked for this user.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::PracticeSession;

/// Sessions needed before a practice is scored on its own history.
pub const MIN_SESSIONS: usize = 3;
pub const NEUTRAL_PRIOR: f64 = 0.5;

const COMPLETION_WEIGHT: f64 = 0.5;
const IMPROVEMENT_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeScore {
    pub practice_id: String,
    pub score: f64,
    pub sessions: usize,
    pub last_used: DateTime<Utc>,
}

#[derive(Default)]
struct Tally {
    sessions: usize,
    completed: usize,
    improvement_sum: f64,
    improvement_samples: usize,
    last_used: Option<DateTime<Utc>>,
}

/// Scores every practice id with at least one finished session, best first.
/// Sessions still open carry no outcome yet and are ignored.
pub fn score(sessions: &[PracticeSession]) -> Vec<PracticeScore> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for session in sessions.iter().filter(|session| !session.is_open()) {
        let tally = tallies.entry(session.practice_id.as_str()).or_default();
        tally.sessions += 1;
        if session.was_completed {
            tally.completed += 1;
        }
        if let Some(improvement) = session.improvement() {
            tally.improvement_sum += f64::from(improvement);
            tally.improvement_samples += 1;
        }
        tally.last_used = tally.last_used.max(Some(session.started_at));
    }

    let mut scores: Vec<PracticeScore> = tallies
        .into_iter()
        .map(|(practice_id, tally)| PracticeScore {
            practice_id: practice_id.to_string(),
            score: tally_score(&tally),
            sessions: tally.sessions,
            last_used: tally.last_used.unwrap_or(DateTime::<Utc>::MIN_UTC),
        })
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.last_used.cmp(&a.last_used))
            .then_with(|| a.practice_id.cmp(&b.practice_id))
    });
    scores
}

/// Practice ids ordered by empirical effectiveness.
pub fn rank(sessions: &[PracticeSession]) -> Vec<String> {
    score(sessions)
        .into_iter()
        .map(|scored| scored.practice_id)
        .collect()
}

fn tally_score(tally: &Tally) -> f64 {
    if tally.sessions < MIN_SESSIONS {
        return NEUTRAL_PRIOR;
    }

    let completion = tally.completed as f64 / tally.sessions as f64;
    // Ordinal improvement spans -2 (clear to stormy) to +2 (stormy to clear).
    let improvement = if tally.improvement_samples == 0 {
        NEUTRAL_PRIOR
    } else {
        let mean = tally.improvement_sum / tally.improvement_samples as f64;
        ((mean + 2.0) / 4.0).clamp(0.0, 1.0)
    };

    COMPLETION_WEIGHT * completion + IMPROVEMENT_WEIGHT * improvement
}
