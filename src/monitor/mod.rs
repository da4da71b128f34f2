//! The monitoring loop: schedule, forced checks, published state and the
//! feedback entry points.

mod controller;
mod feedback;
mod loop_worker;
pub mod state;

pub use controller::MonitoringLoop;
pub use state::MonitorSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Local, Timelike, Utc};
    use pretty_assertions::assert_eq;
    use tokio::sync::watch;
    use tokio::time::{Duration, Instant};

    use crate::classifier::{Classification, ClassifierError};
    use crate::engine::{rebuild_aggregates, NudgeEngine};
    use crate::errors::AgentError;
    use crate::models::{
        ActiveHours, DismissalType, EffortLevel, IssuedNudge, PracticeSession, SilenceReason,
        StressEntry, Weather,
    };
    use crate::settings::EngineConfig;
    use crate::testing::{classification, FakeCapture, FakeSampler, MemoryStore, ScriptedClassifier};

    fn config() -> EngineConfig {
        EngineConfig {
            skip_unchanged_frames: false,
            max_upload_width: None,
            ..Default::default()
        }
    }

    fn monitor_with(
        config: EngineConfig,
        classifier: Arc<ScriptedClassifier>,
    ) -> (MonitoringLoop, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = NudgeEngine::new(
            config,
            Arc::new(FakeSampler::new("Mail")),
            Arc::new(FakeCapture::new(vec![1, 2, 3])),
            classifier,
            store.clone(),
        );
        (MonitoringLoop::new(engine, store.clone()), store)
    }

    fn scripted(script: Vec<Result<Classification, ClassifierError>>) -> Arc<ScriptedClassifier> {
        Arc::new(ScriptedClassifier::new(script))
    }

    async fn wait_cycles(
        rx: &mut watch::Receiver<MonitorSnapshot>,
        cycles: u64,
        within: Duration,
    ) -> MonitorSnapshot {
        tokio::time::timeout(within, rx.wait_for(|s| s.cycles_completed >= cycles))
            .await
            .expect("timed out waiting for cycle")
            .expect("state channel closed")
            .clone()
    }

    #[tokio::test]
    async fn start_runs_a_cycle_and_publishes_it() {
        let (monitor, store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Stormy, 0.9))]));
        let mut rx = monitor.subscribe();

        monitor.start().await.unwrap();
        let snapshot = wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;

        assert!(snapshot.monitoring_active);
        assert_eq!(snapshot.weather, Some(Weather::Stormy));
        assert_eq!(snapshot.last_outcome.as_deref(), Some("nudged"));
        assert!(snapshot.last_nudge.is_some());
        assert_eq!(snapshot.diagnostic, None);
        assert!(snapshot.version >= 2);

        assert!(matches!(monitor.start().await, Err(AgentError::AlreadyRunning)));

        monitor.stop().await.unwrap();
        assert!(!monitor.snapshot().monitoring_active);
        assert!(!monitor.is_running().await);
        assert!(store.preferences.lock().unwrap().baseline_json.is_some());

        let metrics = monitor.metrics().await;
        assert_eq!(metrics.outcome_counts.get("nudged"), Some(&1));
    }

    #[tokio::test]
    async fn check_now_forces_a_cycle_and_silence_is_published() {
        let (monitor, store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Cloudy, 0.8))]));
        let mut rx = monitor.subscribe();
        let mut silence_rx = monitor.subscribe_silence();

        monitor.start().await.unwrap();
        wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;

        monitor.check_now();
        let snapshot = wait_cycles(&mut rx, 2, Duration::from_secs(5)).await;
        assert_eq!(snapshot.last_outcome.as_deref(), Some("silenced"));

        let decision = silence_rx
            .wait_for(Option::is_some)
            .await
            .unwrap()
            .clone()
            .unwrap();
        assert_eq!(decision.reason, SilenceReason::RecentlyInterrupted);
        assert_eq!(snapshot.last_silence, Some(decision));

        monitor.stop().await.unwrap();
        assert_eq!(store.entry_count(), 2);
    }

    #[tokio::test]
    async fn degraded_cycles_surface_a_diagnostic_and_keep_running() {
        let classifier = scripted(vec![
            Err(ClassifierError::Transport("connection refused".into())),
            Err(ClassifierError::Transport("connection refused".into())),
            Ok(classification(Weather::Clear, 0.9)),
        ]);
        let (monitor, _store) = monitor_with(config(), classifier);
        let mut rx = monitor.subscribe();

        monitor.start().await.unwrap();
        let first = wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;
        assert!(first
            .diagnostic
            .as_deref()
            .unwrap()
            .contains("classification unavailable"));
        assert_eq!(first.weather, None);

        monitor.check_now();
        let second = wait_cycles(&mut rx, 2, Duration::from_secs(5)).await;
        assert_eq!(second.diagnostic, None);
        assert_eq!(second.weather, Some(Weather::Clear));

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wake_forces_a_cycle_after_the_settle_delay() {
        let config = EngineConfig {
            check_interval_secs: 3600,
            wake_delay_secs: 30,
            ..config()
        };
        let (monitor, _store) = monitor_with(config, scripted(vec![Ok(classification(Weather::Clear, 0.2))]));
        let mut rx = monitor.subscribe();

        monitor.start().await.unwrap();
        wait_cycles(&mut rx, 1, Duration::from_secs(600)).await;

        let woke_at = Instant::now();
        monitor.notify_wake();
        wait_cycles(&mut rx, 2, Duration::from_secs(600)).await;

        let waited = woke_at.elapsed();
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(3600));

        monitor.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_an_in_flight_cycle_without_writing() {
        let classifier = Arc::new(
            ScriptedClassifier::new(vec![Ok(classification(Weather::Stormy, 0.9))])
                .with_delay(Duration::from_secs(20)),
        );
        let (monitor, store) = monitor_with(config(), classifier.clone());

        monitor.start().await.unwrap();
        while classifier.calls() == 0 {
            tokio::task::yield_now().await;
        }
        monitor.stop().await.unwrap();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.cycles_completed, 0);
        assert_eq!(snapshot.weather, None);
        assert_eq!(store.entry_count(), 0);
        assert_eq!(*monitor.subscribe_silence().borrow(), None);
    }

    #[tokio::test]
    async fn setters_apply_between_cycles() {
        let (monitor, store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Clear, 0.2))]));
        let mut rx = monitor.subscribe();

        monitor.set_active_hours(Some(ActiveHours::new(9, 18))).await.unwrap();
        monitor.set_preferred_practices(vec!["walk".into()]);
        assert_eq!(
            store.preferences.lock().unwrap().active_hours,
            Some(ActiveHours::new(9, 18))
        );

        monitor.start().await.unwrap();
        wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;
        {
            let engine = monitor.engine.lock().await;
            assert_eq!(engine.inputs().active_hours, Some(ActiveHours::new(9, 18)));
            assert_eq!(engine.inputs().preferred_practices.as_slice(), ["walk"]);
        }
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn requested_refresh_rebuilds_ranking_from_history() {
        let (monitor, store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Clear, 0.2))]));
        {
            let mut practices = store.practices.lock().unwrap();
            for hours in 1..=3 {
                let mut session = PracticeSession::start(
                    "box-breathing",
                    Weather::Stormy,
                    Utc::now() - ChronoDuration::hours(hours),
                );
                session.weather_after = Some(Weather::Clear);
                session.was_completed = true;
                session.ended_at = Some(session.started_at + ChronoDuration::minutes(4));
                practices.push(session);
            }
        }
        let mut rx = monitor.subscribe();

        monitor.request_refresh();
        monitor.start().await.unwrap();
        wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;
        {
            let engine = monitor.engine.lock().await;
            assert_eq!(engine.inputs().preferred_practices.as_slice(), ["box-breathing"]);
            assert_eq!(engine.inputs().tool_context.preferred_practices, vec!["box-breathing"]);
        }
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn feedback_is_recorded_and_marks_aggregates_stale() {
        let (monitor, store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Stormy, 0.9))]));
        let mut rx = monitor.subscribe();
        monitor.start().await.unwrap();
        let snapshot = wait_cycles(&mut rx, 1, Duration::from_secs(5)).await;
        monitor.stop().await.unwrap();

        let issued = snapshot.last_nudge.unwrap();
        let event = monitor
            .record_dismissal(&issued, DismissalType::NotNow)
            .await
            .unwrap();
        assert_eq!(event.active_app.as_deref(), Some("Mail"));
        assert_eq!(event.weather, Weather::Stormy);
        assert_eq!(store.dismissals.lock().unwrap().len(), 1);
        assert!(monitor
            .channels
            .refresh_requested
            .load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn late_dismissals_are_attributed_to_the_nudge_hour() {
        let (monitor, store) = monitor_with(config(), scripted(vec![]));
        let shown_at = Utc::now() - ChronoDuration::hours(12);
        let issued = IssuedNudge {
            nudge: classification(Weather::Cloudy, 0.8).nudge.unwrap(),
            effort: EffortLevel::Low,
            weather: Weather::Cloudy,
            active_app: Some("Mail".into()),
            deviation: 0.4,
            issued_at: shown_at,
        };
        for i in 0..3 {
            store.entries.lock().unwrap().push(StressEntry {
                id: format!("e{i}"),
                timestamp: shown_at,
                weather: Weather::Cloudy,
                confidence: 0.8,
                signals: vec![],
                nudge_type: Some("breathing".into()),
                nudge_message: Some("Take three slow breaths".into()),
                active_app: Some("Mail".into()),
                deviation: 0.4,
                thinking: None,
            });
            let event = monitor
                .record_dismissal(&issued, DismissalType::Ignored)
                .await
                .unwrap();
            assert_eq!(event.nudge_issued_at, Some(shown_at));
        }

        let aggregates = rebuild_aggregates(store.as_ref(), monitor.config(), Utc::now()).await;
        let shown_hour = shown_at.with_timezone(&Local).hour();
        let bucket = aggregates
            .patterns
            .bucket(Some("Mail"), shown_hour, Weather::Cloudy)
            .unwrap();
        assert_eq!(bucket.nudges, 3);
        assert_eq!(bucket.dismissals, 3);
        assert_eq!(aggregates.patterns.len(), 1);
    }

    #[tokio::test]
    async fn practice_sessions_close_exactly_once() {
        let (monitor, store) = monitor_with(config(), scripted(vec![]));

        let session = monitor.start_practice("box-breathing", Weather::Stormy).await.unwrap();
        assert!(session.weather_after.is_none());

        let closed = monitor
            .finish_practice(&session.id, Some(Weather::Clear), true, Some("slow exhale".into()))
            .await
            .unwrap();
        assert_eq!(closed.weather_after, Some(Weather::Clear));
        assert!(closed.was_completed);

        let stored = store.practices.lock().unwrap()[0].clone();
        assert_eq!(stored.weather_after, Some(Weather::Clear));
        assert!(stored.was_completed);

        let again = monitor
            .finish_practice(&session.id, Some(Weather::Stormy), false, None)
            .await;
        assert!(matches!(again, Err(AgentError::PracticeAlreadyClosed(_))));
        assert_eq!(
            store.practices.lock().unwrap()[0].weather_after,
            Some(Weather::Clear)
        );

        let missing = monitor.finish_practice("nope", None, false, None).await;
        assert!(matches!(missing, Err(AgentError::UnknownPractice(_))));
    }

    #[tokio::test]
    async fn toggle_flips_monitoring() {
        let (monitor, _store) = monitor_with(config(), scripted(vec![Ok(classification(Weather::Clear, 0.2))]));
        assert!(monitor.toggle().await.unwrap());
        assert!(monitor.is_running().await);
        assert!(!monitor.toggle().await.unwrap());
        assert!(!monitor.is_running().await);
        // Stopping twice is harmless.
        monitor.stop().await.unwrap();
    }
}
