use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Endpoint details for the HTTP vision classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    pub endpoint: Option<String>,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "vision-default".into(),
            api_key_env: "INNERWEATHER_API_KEY".into(),
        }
    }
}

/// Tunables for the monitoring loop and decision engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub check_interval_secs: u64,
    pub classifier_timeout_secs: u64,
    /// Classifications below this confidence never produce a nudge candidate.
    pub confidence_floor: f64,
    pub cooldown_minutes: i64,
    pub dismissal_rate_threshold: f64,
    pub min_bucket_dismissals: u32,
    pub wake_delay_secs: u64,
    /// Rebuild learned aggregates from the store at least this often.
    pub refresh_every_cycles: u32,
    pub history_lookback_days: i64,
    pub activity_window_minutes: i64,
    pub skip_unchanged_frames: bool,
    pub unchanged_distance_threshold: u32,
    pub unchanged_reclassify_minutes: i64,
    /// Frames wider than this are downscaled before upload. `None` uploads as captured.
    pub max_upload_width: Option<u32>,
    pub classifier: ClassifierSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            classifier_timeout_secs: 45,
            confidence_floor: 0.55,
            cooldown_minutes: 20,
            dismissal_rate_threshold: 0.6,
            min_bucket_dismissals: 3,
            wake_delay_secs: 30,
            refresh_every_cycles: 12,
            history_lookback_days: 30,
            activity_window_minutes: 15,
            skip_unchanged_frames: true,
            unchanged_distance_threshold: 8,
            unchanged_reclassify_minutes: 30,
            max_upload_width: Some(1280),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Clamps values a hand-edited settings file may have pushed out of range.
    pub fn sanitized(mut self) -> Self {
        self.check_interval_secs = self.check_interval_secs.max(10);
        self.classifier_timeout_secs = self.classifier_timeout_secs.max(1);
        if !self.confidence_floor.is_finite() {
            self.confidence_floor = Self::default().confidence_floor;
        }
        self.confidence_floor = self.confidence_floor.clamp(0.0, 1.0);
        self.cooldown_minutes = self.cooldown_minutes.max(0);
        if !self.dismissal_rate_threshold.is_finite() {
            self.dismissal_rate_threshold = Self::default().dismissal_rate_threshold;
        }
        self.dismissal_rate_threshold = self.dismissal_rate_threshold.clamp(0.0, 1.0);
        self.min_bucket_dismissals = self.min_bucket_dismissals.max(1);
        self.refresh_every_cycles = self.refresh_every_cycles.max(1);
        self.history_lookback_days = self.history_lookback_days.max(1);
        self.activity_window_minutes = self.activity_window_minutes.max(1);
        self.unchanged_reclassify_minutes = self.unchanged_reclassify_minutes.max(0);
        self.max_upload_width = self.max_upload_width.filter(|width| *width >= 64);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    engine: EngineConfig,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Settings at {} are unreadable ({err}); using defaults",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineConfig {
        self.read().engine.clone().sanitized()
    }

    pub fn update_engine(&self, config: EngineConfig) -> Result<()> {
        let mut guard = self.write();
        guard.engine = config.sanitized();
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized)
            .with_context(|| format!("Failed to write settings to {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace settings at {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
