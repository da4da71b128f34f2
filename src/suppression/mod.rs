//! Suppress-or-act judgment for a candidate nudge.
//!
//! Rules run in a fixed order and the first match wins:
//! 1. outside the active-hours window
//! 2. inside the cooldown after the last interruption
//! 3. the (app, hour, weather) bucket is usually dismissed
//! 4. act, with effort from the baseline deviation

pub mod patterns;

pub use patterns::{BucketKey, BucketStats, LearnedPatterns};

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use uuid::Uuid;

use crate::models::{ActiveHours, EffortLevel, Nudge, SilenceDecision, SilenceReason, Weather};
use crate::settings::EngineConfig;

const RATIONALE_DETAIL_CHARS: usize = 160;

/// Everything a decision needs besides the candidate itself.
#[derive(Debug, Clone)]
pub struct DecisionContext<'a> {
    pub deviation: f64,
    pub patterns: &'a LearnedPatterns,
    pub active_hours: Option<ActiveHours>,
    pub last_interruption: Option<DateTime<Utc>>,
    pub now: DateTime<Local>,
    pub active_app: Option<&'a str>,
    pub weather: Weather,
    pub thinking: Option<&'a str>,
    pub effort_hint: Option<EffortLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Act { nudge: Nudge, effort: EffortLevel },
    Suppress(SilenceDecision),
}

impl Verdict {
    /// Whether this verdict restarts the cooldown window.
    pub fn interrupts(&self) -> bool {
        match self {
            Verdict::Act { .. } => true,
            Verdict::Suppress(decision) => decision.reason == SilenceReason::LearnedDismissalPattern,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuppressionPolicy {
    pub cooldown: Duration,
    pub dismissal_rate_threshold: f64,
    pub min_bucket_dismissals: u32,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SuppressionPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            cooldown: Duration::minutes(config.cooldown_minutes),
            dismissal_rate_threshold: config.dismissal_rate_threshold,
            min_bucket_dismissals: config.min_bucket_dismissals,
        }
    }

    pub fn decide(&self, candidate: Nudge, ctx: &DecisionContext<'_>) -> Verdict {
        if let Some(hours) = ctx.active_hours {
            if !hours.contains(ctx.now.hour()) {
                return self.silence(SilenceReason::OutsideActiveHours, EffortLevel::Low, ctx);
            }
        }

        if let Some(last) = ctx.last_interruption {
            if ctx.now.with_timezone(&Utc) - last < self.cooldown {
                return self.silence(SilenceReason::RecentlyInterrupted, EffortLevel::Low, ctx);
            }
        }

        if let Some(bucket) = ctx
            .patterns
            .bucket(ctx.active_app, ctx.now.hour(), ctx.weather)
        {
            if bucket.dismissals >= self.min_bucket_dismissals
                && bucket.dismissal_rate() >= self.dismissal_rate_threshold
            {
                let effort = effort_for_excess(ctx.deviation - bucket.mean_deviation);
                return self.silence(SilenceReason::LearnedDismissalPattern, effort, ctx);
            }
        }

        let effort = match ctx.effort_hint {
            Some(hint) => effort_for_deviation(ctx.deviation).max(hint),
            None => effort_for_deviation(ctx.deviation),
        };
        Verdict::Act {
            nudge: candidate,
            effort,
        }
    }

    fn silence(
        &self,
        reason: SilenceReason,
        effort: EffortLevel,
        ctx: &DecisionContext<'_>,
    ) -> Verdict {
        Verdict::Suppress(SilenceDecision {
            id: Uuid::new_v4().to_string(),
            reason,
            rationale: rationale(reason, ctx.thinking),
            effort,
            weather: ctx.weather,
            timestamp: ctx.now.with_timezone(&Utc),
        })
    }
}

pub fn effort_for_deviation(deviation: f64) -> EffortLevel {
    if deviation < 1.0 {
        EffortLevel::Low
    } else if deviation < 2.0 {
        EffortLevel::High
    } else {
        EffortLevel::Max
    }
}

/// Overriding a learned "leave me alone" costs more the further the user is
/// from their usual state in that bucket.
pub fn effort_for_excess(excess: f64) -> EffortLevel {
    if excess <= 0.5 {
        EffortLevel::Low
    } else if excess <= 1.5 {
        EffortLevel::High
    } else {
        EffortLevel::Max
    }
}

fn rationale(reason: SilenceReason, thinking: Option<&str>) -> String {
    match thinking.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => {
            let detail: String = text.chars().take(RATIONALE_DETAIL_CHARS).collect();
            format!("{}: {}", reason.label(), detail)
        }
        None => reason.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DismissalEvent, DismissalType};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, hour, minute, 0).unwrap()
    }

    fn nudge() -> Nudge {
        Nudge {
            nudge_type: "breathing".into(),
            message: "Three slow breaths?".into(),
            practice_id: Some("box-breathing".into()),
        }
    }

    fn ctx<'a>(patterns: &'a LearnedPatterns, now: DateTime<Local>) -> DecisionContext<'a> {
        DecisionContext {
            deviation: 0.4,
            patterns,
            active_hours: Some(ActiveHours::new(9, 18)),
            last_interruption: None,
            now,
            active_app: Some("Mail"),
            weather: Weather::Cloudy,
            thinking: Some("Inbox keeps pulling focus"),
            effort_hint: None,
        }
    }

    fn mail_dismissals(count: i64) -> LearnedPatterns {
        let events: Vec<DismissalEvent> = (0..count)
            .map(|i| DismissalEvent {
                id: format!("d{i}"),
                timestamp: at(14, 0).with_timezone(&Utc) + Duration::minutes(i * 10),
                weather: Weather::Cloudy,
                dismissal_type: DismissalType::Dismissed,
                active_app: Some("Mail".into()),
                deviation: Some(0.5),
                nudge_issued_at: None,
            })
            .collect();
        LearnedPatterns::build(&events, &[], Utc::now())
    }

    fn suppressed(verdict: Verdict) -> SilenceDecision {
        match verdict {
            Verdict::Suppress(decision) => decision,
            other => panic!("expected suppression, got {other:?}"),
        }
    }

    #[test]
    fn outside_active_hours_is_silenced_at_low_effort() {
        let patterns = LearnedPatterns::default();
        let mut context = ctx(&patterns, at(22, 0));
        context.deviation = 5.0;
        context.effort_hint = Some(EffortLevel::Max);

        let decision = suppressed(SuppressionPolicy::default().decide(nudge(), &context));
        assert_eq!(decision.reason, SilenceReason::OutsideActiveHours);
        assert_eq!(decision.effort, EffortLevel::Low);
        assert_eq!(
            decision.rationale,
            "outside active hours: Inbox keeps pulling focus"
        );
    }

    #[test]
    fn active_hours_dominate_learned_patterns() {
        let patterns = mail_dismissals(5);
        let mut context = ctx(&patterns, at(14, 30));
        context.active_hours = Some(ActiveHours::new(15, 18));
        let decision = suppressed(SuppressionPolicy::default().decide(nudge(), &context));
        assert_eq!(decision.reason, SilenceReason::OutsideActiveHours);
    }

    #[test]
    fn no_window_means_always_active() {
        let patterns = LearnedPatterns::default();
        let mut context = ctx(&patterns, at(3, 0));
        context.active_hours = None;
        let verdict = SuppressionPolicy::default().decide(nudge(), &context);
        assert!(matches!(verdict, Verdict::Act { .. }));
    }

    #[test]
    fn cooldown_silences_the_second_candidate() {
        let patterns = LearnedPatterns::default();
        let policy = SuppressionPolicy::default();

        let first = policy.decide(nudge(), &ctx(&patterns, at(10, 0)));
        assert!(first.interrupts());

        let mut second_ctx = ctx(&patterns, at(10, 15));
        second_ctx.last_interruption = Some(at(10, 0).with_timezone(&Utc));
        let decision = suppressed(policy.decide(nudge(), &second_ctx));
        assert_eq!(decision.reason, SilenceReason::RecentlyInterrupted);
        assert!(decision.rationale.starts_with("recently interrupted"));
        assert_eq!(decision.effort, EffortLevel::Low);

        let mut later = ctx(&patterns, at(10, 21));
        later.last_interruption = Some(at(10, 0).with_timezone(&Utc));
        assert!(matches!(policy.decide(nudge(), &later), Verdict::Act { .. }));
    }

    #[test]
    fn usually_dismissed_bucket_is_silenced_with_scaled_effort() {
        let patterns = mail_dismissals(5);
        let policy = SuppressionPolicy::default();

        let mut calm = ctx(&patterns, at(14, 45));
        calm.deviation = 0.6;
        let decision = suppressed(policy.decide(nudge(), &calm));
        assert_eq!(decision.reason, SilenceReason::LearnedDismissalPattern);
        assert_eq!(decision.effort, EffortLevel::Low);

        let mut tense = ctx(&patterns, at(14, 45));
        tense.deviation = 1.5;
        assert_eq!(suppressed(policy.decide(nudge(), &tense)).effort, EffortLevel::High);

        let mut frantic = ctx(&patterns, at(14, 45));
        frantic.deviation = 3.0;
        assert_eq!(suppressed(policy.decide(nudge(), &frantic)).effort, EffortLevel::Max);
    }

    #[test]
    fn too_few_dismissals_do_not_suppress() {
        let patterns = mail_dismissals(2);
        let verdict = SuppressionPolicy::default().decide(nudge(), &ctx(&patterns, at(14, 45)));
        assert!(matches!(verdict, Verdict::Act { .. }));
    }

    #[test]
    fn other_buckets_are_unaffected() {
        let patterns = mail_dismissals(5);
        let mut context = ctx(&patterns, at(14, 45));
        context.active_app = Some("Xcode");
        assert!(matches!(
            SuppressionPolicy::default().decide(nudge(), &context),
            Verdict::Act { .. }
        ));
    }

    #[test]
    fn act_effort_follows_deviation_and_hint() {
        let patterns = LearnedPatterns::default();
        let policy = SuppressionPolicy::default();
        let cases = [
            (0.2, None, EffortLevel::Low),
            (1.2, None, EffortLevel::High),
            (2.5, None, EffortLevel::Max),
            (0.2, Some(EffortLevel::High), EffortLevel::High),
            (2.5, Some(EffortLevel::Low), EffortLevel::Max),
        ];
        for (deviation, hint, expected) in cases {
            let mut context = ctx(&patterns, at(11, 0));
            context.deviation = deviation;
            context.effort_hint = hint;
            match policy.decide(nudge(), &context) {
                Verdict::Act { effort, nudge: acted } => {
                    assert_eq!(effort, expected, "deviation {deviation}");
                    assert_eq!(acted, nudge());
                }
                other => panic!("expected act, got {other:?}"),
            }
        }
    }

    #[test]
    fn rationale_detail_is_bounded() {
        let long = "x".repeat(400);
        let text = rationale(SilenceReason::RecentlyInterrupted, Some(&long));
        assert_eq!(text.chars().count(), "recently interrupted: ".len() + 160);
        assert_eq!(rationale(SilenceReason::RecentlyInterrupted, Some("  ")), "recently interrupted");
    }

    #[test]
    fn effort_tiers_are_monotonic() {
        let mut previous = EffortLevel::Low;
        for step in 0..40 {
            let effort = effort_for_deviation(f64::from(step) * 0.1);
            assert!(effort >= previous);
            previous = effort;
        }
    }
}
