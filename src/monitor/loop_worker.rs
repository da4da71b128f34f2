use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::MonitoringLoop;
use crate::engine::{rebuild_aggregates, CycleOutcome};

// Set to false to silence the per-cycle logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub(super) async fn monitoring_loop(monitor: MonitoringLoop, cancel_token: CancellationToken) {
    let period = Duration::from_secs(monitor.config.check_interval_secs);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles_since_refresh: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("monitoring loop shutting down");
                break;
            }
            _ = ticker.tick() => {}
            _ = monitor.channels.check_now.notified() => {
                log_info!("immediate check requested");
                ticker.reset();
            }
        }

        run_cycle(&monitor, &cancel_token, &mut cycles_since_refresh).await;
    }
}

async fn run_cycle(
    monitor: &MonitoringLoop,
    cancel_token: &CancellationToken,
    cycles_since_refresh: &mut u32,
) {
    let refresh_due = *cycles_since_refresh >= monitor.config.refresh_every_cycles;
    if monitor.channels.refresh_requested.swap(false, Ordering::SeqCst) || refresh_due {
        let aggregates =
            rebuild_aggregates(monitor.store.as_ref(), &monitor.config, Utc::now()).await;
        log_info!(
            "aggregates rebuilt: {} pattern buckets, {} ranked practices",
            aggregates.patterns.len(),
            aggregates.preferred_practices.len()
        );
        let mut rebuilt = aggregates.into_pending();
        monitor.engine.lock().await.apply_inputs(&mut rebuilt);
        *cycles_since_refresh = 0;
    }

    let report = {
        let mut engine = monitor.engine.lock().await;
        // Explicitly pushed values win over the rebuild above.
        let mut staged = std::mem::take(&mut *monitor.channels.pending());
        engine.apply_inputs(&mut staged);
        engine.run_cycle(cancel_token).await
    };

    if report.outcome.is_cancelled() {
        return;
    }
    *cycles_since_refresh += 1;

    if let Some(diagnostic) = &report.diagnostic {
        log_warn!("cycle diagnostic: {diagnostic}");
    }

    monitor.metrics.record_cycle(report.metrics.clone()).await;

    let cycle_at = report.metrics.timestamp;
    let outcome_label = report.outcome.label();
    monitor.publish(|snapshot| {
        if let Some(weather) = report.weather {
            snapshot.weather = Some(weather);
        }
        snapshot.diagnostic = report.diagnostic.clone();
        match &report.outcome {
            CycleOutcome::Nudged(issued) => snapshot.last_nudge = Some(issued.clone()),
            CycleOutcome::Silenced(decision) => snapshot.last_silence = Some(decision.clone()),
            CycleOutcome::Skipped(_) => {}
        }
        snapshot.last_cycle_at = Some(cycle_at);
        snapshot.last_outcome = Some(outcome_label);
        snapshot.cycles_completed += 1;
    });

    if let CycleOutcome::Silenced(decision) = report.outcome {
        monitor.channels.silence_tx.send_replace(Some(decision));
    }
}
