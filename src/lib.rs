//! Inner-weather nudge engine.
//!
//! Samples on-screen activity on a schedule, asks a vision classifier for the
//! user's inner weather and decides whether a coping nudge is worth the
//! interruption. The desktop shell supplies capture and sampling through the
//! `sensing` traits and consumes state through `MonitoringLoop::subscribe`.

pub mod baseline;
pub mod classifier;
pub mod db;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod ranker;
pub mod sensing;
pub mod settings;
pub mod suppression;
mod utils;

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use log::{info, warn};

pub use baseline::BaselineTracker;
pub use classifier::{HttpVisionClassifier, VisionClassifier};
pub use db::{Database, EventStore};
pub use engine::{CycleOutcome, NudgeEngine, SkipReason};
pub use errors::AgentError;
pub use monitor::{MonitorSnapshot, MonitoringLoop};
pub use sensing::{BehaviorSampler, ScreenCapture};
pub use settings::{EngineConfig, SettingsStore};

use engine::PendingInputs;

const DATABASE_FILE: &str = "innerweather.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Practice sessions left open longer than this are closed as abandoned on startup.
const STALE_PRACTICE_HOURS: i64 = 6;

/// Installs `env_logger`, honoring `RUST_LOG` and defaulting to info.
pub fn init_logging() {
    let result = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
    if result.is_err() {
        log::debug!("logger already initialized");
    }
}

/// Everything the shell holds on to for the lifetime of the app.
pub struct Agent {
    pub db: Database,
    pub settings: SettingsStore,
    pub monitor: MonitoringLoop,
}

/// Opens the store and settings under `data_dir` and wires a stopped monitor.
///
/// Without an explicit `classifier` the HTTP classifier is built from
/// settings, which fails with `ConfigurationMissing` when no endpoint is set.
pub async fn bootstrap(
    data_dir: &Path,
    sampler: Arc<dyn BehaviorSampler>,
    capture: Arc<dyn ScreenCapture>,
    classifier: Option<Arc<dyn VisionClassifier>>,
) -> anyhow::Result<Agent> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let db = Database::new(data_dir.join(DATABASE_FILE))?;

    let cutoff = Utc::now() - chrono::Duration::hours(STALE_PRACTICE_HOURS);
    let abandoned = db.abandon_stale_practice_sessions(cutoff).await?;
    if abandoned > 0 {
        warn!("closed {abandoned} practice session(s) left open since before {cutoff}");
    }

    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let config = settings.engine();

    let classifier: Arc<dyn VisionClassifier> = match classifier {
        Some(classifier) => classifier,
        None => Arc::new(HttpVisionClassifier::from_settings(
            &config.classifier,
            Duration::from_secs(config.classifier_timeout_secs),
        )?),
    };

    let preferences = db.get_preferences().await.unwrap_or_else(|err| {
        warn!("preferences unreadable, starting fresh: {err:#}");
        Default::default()
    });

    let store: Arc<dyn EventStore> = Arc::new(db.clone());
    let mut engine = NudgeEngine::new(config, sampler, capture, classifier, Arc::clone(&store));

    if let Some(json) = preferences.baseline_json.as_deref() {
        match BaselineTracker::from_json(json) {
            Ok(baseline) => {
                info!("restored baseline from {} observations", baseline.observations());
                engine.restore_baseline(baseline);
            }
            Err(err) => warn!("discarding unreadable baseline snapshot: {err}"),
        }
    }

    let mut initial = PendingInputs {
        preferred_practices: Some(Arc::new(preferences.preferred_practices)),
        active_hours: Some(preferences.active_hours),
        ..Default::default()
    };
    engine.apply_inputs(&mut initial);

    let monitor = MonitoringLoop::new(engine, store);
    monitor.request_refresh();

    info!("inner weather engine ready at {}", data_dir.display());
    Ok(Agent {
        db,
        settings,
        monitor,
    })
}
