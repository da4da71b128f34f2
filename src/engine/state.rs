use serde::{Deserialize, Serialize};

use crate::metrics::CycleMetrics;
use crate::models::{IssuedNudge, SilenceDecision, StressEntry, Weather};

/// Where the engine is within a cycle. Terminal phases fall back to `Idle`
/// once bookkeeping is done.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    #[default]
    Idle,
    Sampling,
    Classifying,
    Deciding,
    Nudging,
    Silent,
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    SamplerUnavailable,
    CaptureUnavailable,
    ScreenUnchanged,
    ClassificationUnavailable,
    /// Classified, but below the confidence floor or without a suggestion.
    /// The reading is still recorded.
    NoCandidate,
    Cancelled,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::SamplerUnavailable => "behavior sampler unavailable",
            SkipReason::CaptureUnavailable => "capture unavailable",
            SkipReason::ScreenUnchanged => "screen unchanged",
            SkipReason::ClassificationUnavailable => "classification unavailable",
            SkipReason::NoCandidate => "no nudge candidate",
            SkipReason::Cancelled => "cancelled",
        }
    }

    /// Skips that reflect a failing collaborator rather than a quiet cycle.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            SkipReason::SamplerUnavailable
                | SkipReason::CaptureUnavailable
                | SkipReason::ClassificationUnavailable
        )
    }
}

/// Terminal state of one cycle. Exactly one per cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum CycleOutcome {
    Nudged(IssuedNudge),
    Silenced(SilenceDecision),
    Skipped(SkipReason),
}

impl CycleOutcome {
    pub fn phase(&self) -> CyclePhase {
        match self {
            CycleOutcome::Nudged(_) => CyclePhase::Nudging,
            CycleOutcome::Silenced(_) => CyclePhase::Silent,
            CycleOutcome::Skipped(_) => CyclePhase::Skipped,
        }
    }

    pub fn label(&self) -> String {
        match self {
            CycleOutcome::Nudged(_) => "nudged".to_string(),
            CycleOutcome::Silenced(_) => "silenced".to_string(),
            CycleOutcome::Skipped(reason) => format!("skipped:{}", reason.label()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CycleOutcome::Skipped(SkipReason::Cancelled))
    }
}

/// Everything a completed cycle hands back to the loop.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Set whenever the cycle reached a classification.
    pub weather: Option<Weather>,
    pub deviation: f64,
    /// The reading this cycle produced, persisted or not.
    pub entry: Option<StressEntry>,
    pub entry_persisted: bool,
    /// Human-readable cause when the cycle degraded or a write was dropped.
    pub diagnostic: Option<String>,
    pub metrics: CycleMetrics,
}

impl CycleReport {
    pub(crate) fn skipped(reason: SkipReason, diagnostic: Option<String>) -> Self {
        Self {
            outcome: CycleOutcome::Skipped(reason),
            weather: None,
            deviation: 0.0,
            entry: None,
            entry_persisted: false,
            diagnostic,
            metrics: CycleMetrics::default(),
        }
    }
}
