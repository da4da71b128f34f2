use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::monitoring_loop;
use super::state::MonitorSnapshot;
use crate::db::EventStore;
use crate::engine::{NudgeEngine, PendingInputs};
use crate::errors::AgentError;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::models::{ActiveHours, SilenceDecision, ToolContext};
use crate::settings::EngineConfig;
use crate::suppression::LearnedPatterns;

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

pub(super) struct Channels {
    pub(super) state_tx: watch::Sender<MonitorSnapshot>,
    pub(super) silence_tx: watch::Sender<Option<SilenceDecision>>,
    pub(super) check_now: Notify,
    pub(super) refresh_requested: AtomicBool,
    pending: StdMutex<PendingInputs>,
    wake: StdMutex<Option<JoinHandle<()>>>,
}

impl Channels {
    pub(super) fn pending(&self) -> MutexGuard<'_, PendingInputs> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wake(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.wake.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the schedule and the published state.
///
/// Cheap to clone; clones share the same engine, channels and worker.
#[derive(Clone)]
pub struct MonitoringLoop {
    pub(super) engine: Arc<Mutex<NudgeEngine>>,
    pub(super) store: Arc<dyn EventStore>,
    pub(super) config: EngineConfig,
    pub(super) metrics: MetricsCollector,
    pub(super) channels: Arc<Channels>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl MonitoringLoop {
    pub fn new(engine: NudgeEngine, store: Arc<dyn EventStore>) -> Self {
        let config = engine.config().clone();
        let (state_tx, _) = watch::channel(MonitorSnapshot::default());
        let (silence_tx, _) = watch::channel(None);

        Self {
            engine: Arc::new(Mutex::new(engine)),
            store,
            config,
            metrics: MetricsCollector::new(),
            channels: Arc::new(Channels {
                state_tx,
                silence_tx,
                check_now: Notify::new(),
                refresh_requested: AtomicBool::new(false),
                pending: StdMutex::new(PendingInputs::default()),
                wake: StdMutex::new(None),
            }),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn start(&self) -> Result<(), AgentError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().map(|w| !w.handle.is_finished()).unwrap_or(false) {
            return Err(AgentError::AlreadyRunning);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitoring_loop(self.clone(), cancel_token.clone()));
        *worker = Some(Worker {
            handle,
            cancel_token,
        });

        self.publish(|snapshot| snapshot.monitoring_active = true);
        info!(
            "monitoring started, checking every {}s",
            self.config.check_interval_secs
        );
        Ok(())
    }

    /// Cancels the loop, waits for it to wind down and keeps the learned
    /// baseline for the next start. Stopping an idle monitor is a no-op.
    pub async fn stop(&self) -> Result<(), AgentError> {
        if let Some(pending_wake) = self.channels.wake().take() {
            pending_wake.abort();
        }

        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(());
        };
        worker.cancel_token.cancel();
        if let Err(err) = worker.handle.await {
            warn!("monitoring loop task failed to join: {err}");
        }

        self.publish(|snapshot| snapshot.monitoring_active = false);
        info!("monitoring stopped");
        self.persist_baseline().await
    }

    /// Starts or stops monitoring; returns whether it is now active.
    pub async fn toggle(&self) -> Result<bool, AgentError> {
        if self.is_running().await {
            self.stop().await?;
            Ok(false)
        } else {
            self.start().await?;
            Ok(true)
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    /// Requests a cycle now. Honored once any in-flight cycle has finished.
    pub fn check_now(&self) {
        self.channels.check_now.notify_one();
    }

    /// Forces a cycle once the screen has had `wake_delay_secs` to settle.
    pub fn notify_wake(&self) {
        let delay = Duration::from_secs(self.config.wake_delay_secs);
        let channels = Arc::clone(&self.channels);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            channels.check_now.notify_one();
        });
        if let Some(previous) = self.channels.wake().replace(handle) {
            previous.abort();
        }
    }

    /// Weather, diagnostic and activity updates. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.channels.state_tx.subscribe()
    }

    pub fn subscribe_silence(&self) -> watch::Receiver<Option<SilenceDecision>> {
        self.channels.silence_tx.subscribe()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.channels.state_tx.borrow().clone()
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.metrics.get_snapshot().await
    }

    pub fn set_learned_patterns(&self, patterns: LearnedPatterns) {
        self.channels.pending().patterns = Some(Arc::new(patterns));
    }

    pub fn set_preferred_practices(&self, practices: Vec<String>) {
        self.channels.pending().preferred_practices = Some(Arc::new(practices));
    }

    pub fn set_tool_context(&self, context: ToolContext) {
        self.channels.pending().tool_context = Some(Arc::new(context));
    }

    /// Stages the window for the next cycle and saves it with the preferences.
    pub async fn set_active_hours(&self, hours: Option<ActiveHours>) -> Result<(), AgentError> {
        self.channels.pending().active_hours = Some(hours);
        self.store
            .save_active_hours(hours)
            .await
            .map_err(AgentError::store)
    }

    /// Marks the derived aggregates stale; they are rebuilt before the next cycle.
    pub fn request_refresh(&self) {
        self.channels.refresh_requested.store(true, Ordering::SeqCst);
    }

    pub(super) fn publish(&self, update: impl FnOnce(&mut MonitorSnapshot)) {
        self.channels.state_tx.send_modify(|snapshot| {
            update(snapshot);
            snapshot.version += 1;
        });
    }

    async fn persist_baseline(&self) -> Result<(), AgentError> {
        let baseline = {
            let engine = self.engine.lock().await;
            engine.baseline().to_json()
        };
        let baseline = match baseline {
            Ok(json) => json,
            Err(err) => {
                warn!("baseline could not be serialized: {err}");
                return Ok(());
            }
        };

        self.store
            .save_baseline(&baseline)
            .await
            .map_err(AgentError::store)
    }
}
