//! Folds raw activity samples into per-cycle `BehaviorMetrics`.

use std::collections::{BTreeMap, VecDeque};

use chrono::Duration;

use crate::models::{ActivitySample, BehaviorMetrics};

/// Idle time that ends a working session.
const SESSION_BREAK_IDLE_SECS: f64 = 300.0;
const RECENT_APPS_LIMIT: usize = 8;

#[derive(Debug, Clone)]
pub struct ActivityWindow {
    window: Duration,
    samples: VecDeque<ActivitySample>,
    session_started_at: Option<chrono::DateTime<chrono::Utc>>,
    recent_apps: VecDeque<String>,
}

impl ActivityWindow {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window: Duration::minutes(window_minutes.max(1)),
            samples: VecDeque::new(),
            session_started_at: None,
            recent_apps: VecDeque::with_capacity(RECENT_APPS_LIMIT),
        }
    }

    /// Adds `sample` and recomputes metrics over the trailing window.
    pub fn record(&mut self, sample: ActivitySample) -> BehaviorMetrics {
        if let Some(last) = self.samples.back() {
            // A clock jump backwards restarts the window rather than producing negative spans.
            if sample.at < last.at {
                self.samples.clear();
                self.session_started_at = None;
            }
        }

        if sample.idle_secs >= SESSION_BREAK_IDLE_SECS || self.session_started_at.is_none() {
            self.session_started_at = Some(sample.at);
        }

        if let Some(app) = sample.active_app.as_deref() {
            if self.recent_apps.back().map(String::as_str) != Some(app) {
                self.recent_apps.push_back(app.to_string());
                while self.recent_apps.len() > RECENT_APPS_LIMIT {
                    self.recent_apps.pop_front();
                }
            }
        }

        let cutoff = sample.at - self.window;
        self.samples.push_back(sample);
        while self
            .samples
            .front()
            .map(|front| front.at < cutoff)
            .unwrap_or(false)
        {
            self.samples.pop_front();
        }

        self.metrics()
    }

    fn metrics(&self) -> BehaviorMetrics {
        let Some(latest) = self.samples.back() else {
            return BehaviorMetrics::default();
        };

        // A sample's own count covers the span since the one before it, so the
        // first sample in the window contributes nothing.
        let switches: u32 = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(prev, next)| {
                let observed = next.active_app.is_some() && prev.active_app != next.active_app;
                next.app_switches.max(u32::from(observed))
            })
            .sum();

        let span_minutes = self
            .samples
            .front()
            .map(|first| (latest.at - first.at).num_seconds() as f64 / 60.0)
            .unwrap_or(0.0)
            .max(1.0);

        let mut focus: BTreeMap<String, f64> = BTreeMap::new();
        let mut counted = 0usize;
        for sample in &self.samples {
            if let Some(app) = &sample.active_app {
                *focus.entry(app.clone()).or_default() += 1.0;
                counted += 1;
            }
        }
        if counted > 0 {
            for share in focus.values_mut() {
                *share /= counted as f64;
            }
        }

        let session_duration_secs = self
            .session_started_at
            .map(|start| (latest.at - start).num_seconds().max(0) as f64)
            .unwrap_or(0.0);

        BehaviorMetrics {
            switches_per_minute: f64::from(switches) / span_minutes,
            session_duration_secs,
            focus_fractions: focus,
            notification_count: self.samples.iter().map(|s| s.notification_count).sum(),
            recent_apps: self.recent_apps.iter().cloned().collect(),
            window_count: latest.window_count,
            idle_secs: latest.idle_secs,
        }
    }
}
