use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::inputs::{EngineInputs, PendingInputs};
use super::state::{CycleOutcome, CyclePhase, CycleReport, SkipReason};
use crate::baseline::BaselineTracker;
use crate::classifier::{ClassificationGateway, ClassificationRequest, VisionClassifier, MAX_ATTEMPTS};
use crate::db::EventStore;
use crate::errors::AgentError;
use crate::metrics::CycleMetrics;
use crate::models::{IssuedNudge, StressEntry};
use crate::sensing::frame::downscale_for_upload;
use crate::sensing::phash::{compute_phash, is_unchanged};
use crate::sensing::{ActivityWindow, BehaviorSampler, ScreenCapture};
use crate::settings::EngineConfig;
use crate::suppression::{DecisionContext, SuppressionPolicy, Verdict};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Runs one sample → classify → decide → record pass at a time.
///
/// Owned by the monitoring loop; nothing else mutates it while a cycle runs.
pub struct NudgeEngine {
    config: EngineConfig,
    policy: SuppressionPolicy,
    sampler: Arc<dyn BehaviorSampler>,
    capture: Arc<dyn ScreenCapture>,
    gateway: ClassificationGateway,
    store: Arc<dyn EventStore>,
    activity: ActivityWindow,
    baseline: BaselineTracker,
    inputs: EngineInputs,
    phase: CyclePhase,
    last_interruption: Option<DateTime<Utc>>,
    last_entry_at: Option<DateTime<Utc>>,
    last_classified: Option<(String, DateTime<Utc>)>,
    warned_no_active_hours: bool,
}

/// Frame bytes after fingerprinting and downscaling.
struct PreparedFrame {
    bytes: Arc<Vec<u8>>,
    phash: Option<String>,
}

impl NudgeEngine {
    pub fn new(
        config: EngineConfig,
        sampler: Arc<dyn BehaviorSampler>,
        capture: Arc<dyn ScreenCapture>,
        classifier: Arc<dyn VisionClassifier>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let config = config.sanitized();
        let gateway = ClassificationGateway::new(
            classifier,
            std::time::Duration::from_secs(config.classifier_timeout_secs),
        );
        Self {
            policy: SuppressionPolicy::from_config(&config),
            activity: ActivityWindow::new(config.activity_window_minutes),
            config,
            sampler,
            capture,
            gateway,
            store,
            baseline: BaselineTracker::default(),
            inputs: EngineInputs::default(),
            phase: CyclePhase::Idle,
            last_interruption: None,
            last_entry_at: None,
            last_classified: None,
            warned_no_active_hours: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn inputs(&self) -> &EngineInputs {
        &self.inputs
    }

    pub fn baseline(&self) -> &BaselineTracker {
        &self.baseline
    }

    pub fn restore_baseline(&mut self, baseline: BaselineTracker) {
        self.baseline = baseline;
    }

    pub fn last_interruption(&self) -> Option<DateTime<Utc>> {
        self.last_interruption
    }

    /// Applies staged inputs. Only called between cycles.
    pub fn apply_inputs(&mut self, pending: &mut PendingInputs) {
        pending.apply_to(&mut self.inputs);
    }

    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        self.run_cycle_at(Local::now(), cancel).await
    }

    /// Runs one full cycle as of `now`. Never fails: collaborator trouble ends
    /// the cycle as `Skipped` with a diagnostic.
    pub async fn run_cycle_at(
        &mut self,
        now: DateTime<Local>,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let cycle_started = Instant::now();
        let mut metrics = CycleMetrics {
            timestamp: now.with_timezone(&Utc),
            ..Default::default()
        };

        let mut report = self.cycle(now, cancel, &mut metrics).await;

        metrics.total_ms = cycle_started.elapsed().as_millis() as u64;
        metrics.outcome = report.outcome.label();
        report.metrics = metrics;

        self.enter(report.outcome.phase());
        match &report.outcome {
            CycleOutcome::Skipped(reason) if reason.is_degraded() => log_warn!(
                "cycle skipped ({}): {}",
                reason.label(),
                report.diagnostic.as_deref().unwrap_or("no detail")
            ),
            outcome => log_info!(
                "cycle finished: {} (deviation {:.2}, {}ms)",
                outcome.label(),
                report.deviation,
                report.metrics.total_ms
            ),
        }
        self.enter(CyclePhase::Idle);
        report
    }

    async fn cycle(
        &mut self,
        now: DateTime<Local>,
        cancel: &CancellationToken,
        metrics: &mut CycleMetrics,
    ) -> CycleReport {
        let now_utc = now.with_timezone(&Utc);
        self.enter(CyclePhase::Sampling);

        let stage = Instant::now();
        let sample = match until_cancelled(cancel, self.sampler.sample()).await {
            None => return CycleReport::skipped(SkipReason::Cancelled, None),
            Some(Err(err)) => {
                let error = AgentError::SamplerFailure(format!("{err:#}"));
                return CycleReport::skipped(
                    SkipReason::SamplerUnavailable,
                    Some(error.to_string()),
                );
            }
            Some(Ok(sample)) => sample,
        };
        metrics.sample_ms = stage.elapsed().as_millis() as u64;

        let fallback_app = sample.active_app.clone();
        let behavior = self.activity.record(sample);
        let deviation = self.baseline.observe(&behavior);
        let active_app = behavior
            .dominant_app()
            .map(str::to_string)
            .or(fallback_app);

        let stage = Instant::now();
        let frame = match until_cancelled(cancel, self.capture.capture_frame()).await {
            None => return CycleReport::skipped(SkipReason::Cancelled, None),
            Some(Err(err)) => {
                let error = AgentError::CaptureFailure(format!("{err:#}"));
                let mut report = CycleReport::skipped(
                    SkipReason::CaptureUnavailable,
                    Some(error.to_string()),
                );
                report.deviation = deviation;
                return report;
            }
            Some(Ok(frame)) => frame,
        };
        metrics.capture_ms = Some(stage.elapsed().as_millis() as u64);
        metrics.frame_bytes = frame.bytes.len();

        let prepared = self.prepare_frame(frame.bytes).await;
        if self.screen_unchanged(prepared.phash.as_deref(), now_utc) {
            let mut report = CycleReport::skipped(SkipReason::ScreenUnchanged, None);
            report.deviation = deviation;
            return report;
        }

        self.enter(CyclePhase::Classifying);
        let request = ClassificationRequest {
            image: prepared.bytes,
            tool_context: Arc::clone(&self.inputs.tool_context),
        };
        let stage = Instant::now();
        let answer = match until_cancelled(cancel, self.gateway.classify(request)).await {
            None => return CycleReport::skipped(SkipReason::Cancelled, None),
            Some(Err(err)) => {
                metrics.classify_ms = Some(stage.elapsed().as_millis() as u64);
                metrics.classify_attempts = MAX_ATTEMPTS;
                let mut report = CycleReport::skipped(
                    SkipReason::ClassificationUnavailable,
                    Some(format!("classification unavailable: {err}")),
                );
                report.deviation = deviation;
                return report;
            }
            Some(Ok(answer)) => answer,
        };
        metrics.classify_ms = Some(stage.elapsed().as_millis() as u64);
        metrics.classify_attempts = answer.attempts;
        let classification = answer.classification;

        self.enter(CyclePhase::Deciding);
        let candidate = classification
            .nudge_candidate(self.config.confidence_floor)
            .cloned()
            .map(|mut nudge| {
                if nudge.practice_id.is_none() {
                    nudge.practice_id = self.inputs.preferred_practices.first().cloned();
                }
                nudge
            });

        let verdict = match candidate {
            Some(nudge) => {
                if self.inputs.active_hours.is_none() && !self.warned_no_active_hours {
                    let missing = AgentError::ConfigurationMissing("active hours".into());
                    log_warn!("{missing}; treating every hour as active");
                    self.warned_no_active_hours = true;
                }
                let context = DecisionContext {
                    deviation,
                    patterns: &self.inputs.patterns,
                    active_hours: self.inputs.active_hours,
                    last_interruption: self.last_interruption,
                    now,
                    active_app: active_app.as_deref(),
                    weather: classification.weather,
                    thinking: classification.thinking.as_deref(),
                    effort_hint: classification.effort_hint,
                };
                Some(self.policy.decide(nudge, &context))
            }
            None => None,
        };

        // Last chance to drop the cycle; the write below is never interrupted.
        if cancel.is_cancelled() {
            return CycleReport::skipped(SkipReason::Cancelled, None);
        }

        let timestamp = match self.last_entry_at {
            Some(last) if last > now_utc => last,
            _ => now_utc,
        };
        let acted_nudge = match &verdict {
            Some(Verdict::Act { nudge, .. }) => Some(nudge.clone()),
            _ => None,
        };
        let entry = StressEntry {
            id: Uuid::new_v4().to_string(),
            timestamp,
            weather: classification.weather,
            confidence: classification.confidence,
            signals: classification.signals.clone(),
            nudge_type: acted_nudge.as_ref().map(|n| n.nudge_type.clone()),
            nudge_message: acted_nudge.as_ref().map(|n| n.message.clone()),
            active_app: active_app.clone(),
            deviation,
            thinking: classification.thinking.clone(),
        };

        let stage = Instant::now();
        let persisted = self.persist_entry(&entry).await;
        metrics.store_ms = Some(stage.elapsed().as_millis() as u64);
        self.last_entry_at = Some(timestamp);
        if let Some(phash) = prepared.phash {
            self.last_classified = Some((phash, now_utc));
        }

        if verdict.as_ref().map(Verdict::interrupts).unwrap_or(false) {
            self.last_interruption = Some(now_utc);
        }

        let outcome = match verdict {
            Some(Verdict::Act { nudge, effort }) => CycleOutcome::Nudged(IssuedNudge {
                nudge,
                effort,
                weather: classification.weather,
                active_app,
                deviation,
                issued_at: timestamp,
            }),
            Some(Verdict::Suppress(decision)) => CycleOutcome::Silenced(decision),
            None => CycleOutcome::Skipped(SkipReason::NoCandidate),
        };

        CycleReport {
            outcome,
            weather: Some(classification.weather),
            deviation,
            entry: Some(entry),
            entry_persisted: persisted.is_ok(),
            diagnostic: persisted.err().map(|err| err.to_string()),
            metrics: CycleMetrics::default(),
        }
    }

    async fn prepare_frame(&self, bytes: Vec<u8>) -> PreparedFrame {
        let bytes = Arc::new(bytes);

        let phash = if self.config.skip_unchanged_frames {
            let source = Arc::clone(&bytes);
            match tokio::task::spawn_blocking(move || compute_phash(&source)).await {
                Ok(Ok(hash)) => Some(hash),
                Ok(Err(err)) => {
                    log_warn!("frame fingerprint failed: {err:#}");
                    None
                }
                Err(err) => {
                    log_warn!("frame fingerprint worker failed: {err}");
                    None
                }
            }
        } else {
            None
        };

        let bytes = match self.config.max_upload_width {
            Some(max_width) => {
                let source = Arc::clone(&bytes);
                match tokio::task::spawn_blocking(move || downscale_for_upload(&source, max_width))
                    .await
                {
                    Ok(Ok(scaled)) => Arc::new(scaled),
                    Ok(Err(err)) => {
                        log_warn!("uploading frame as captured: {err:#}");
                        bytes
                    }
                    Err(err) => {
                        log_warn!("downscale worker failed: {err}");
                        bytes
                    }
                }
            }
            None => bytes,
        };

        PreparedFrame { bytes, phash }
    }

    fn screen_unchanged(&self, phash: Option<&str>, now: DateTime<Utc>) -> bool {
        let (Some(current), Some((previous, classified_at))) = (phash, &self.last_classified) else {
            return false;
        };
        let fresh = now - *classified_at < Duration::minutes(self.config.unchanged_reclassify_minutes);
        fresh && is_unchanged(Some(previous), current, self.config.unchanged_distance_threshold)
    }

    /// One retry, then the entry is dropped.
    async fn persist_entry(&self, entry: &StressEntry) -> Result<(), AgentError> {
        if let Err(first) = self.store.append_entry(entry).await {
            log_warn!("stress entry write failed, retrying: {first:#}");
            if let Err(second) = self.store.append_entry(entry).await {
                let error = AgentError::store(second);
                log_warn!("dropping stress entry {}: {error}", entry.id);
                return Err(error);
            }
        }
        Ok(())
    }

    fn enter(&mut self, phase: CyclePhase) {
        log_debug!("cycle phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

/// `None` when `cancel` fires before `fut` completes.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
