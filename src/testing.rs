//! In-crate fakes for the collaborator traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::classifier::{
    Classification, ClassificationRequest, ClassifierError, VisionClassifier,
};
use crate::db::EventStore;
use crate::models::{
    ActiveHours, ActivitySample, CloseOutcome, DismissalEvent, Nudge, PracticeClose, PracticeSession,
    Preferences, StressEntry, Weather,
};
use crate::sensing::{BehaviorSampler, Frame, ScreenCapture};

pub fn classification(weather: Weather, confidence: f64) -> Classification {
    Classification {
        weather,
        confidence,
        signals: vec!["unread badge climbing".into()],
        nudge: Some(Nudge {
            nudge_type: "breathing".into(),
            message: "Take three slow breaths".into(),
            practice_id: None,
        }),
        thinking: Some("Rapid switching between inbox and chat".into()),
        effort_hint: None,
    }
}

/// Replays a fixed script of answers; repeats the last one once exhausted.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Classification, ClassifierError>>>,
    last: Mutex<Option<Classification>>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Result<Classification, ClassifierError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(answer)) => {
                *self.last.lock().unwrap() = Some(answer.clone());
                Ok(answer)
            }
            Some(Err(err)) => Err(err),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ClassifierError::Transport("script exhausted".into())),
        }
    }
}

pub struct FakeSampler {
    app: Mutex<Option<String>>,
    fail: AtomicBool,
}

impl FakeSampler {
    pub fn new(app: &str) -> Self {
        Self {
            app: Mutex::new(Some(app.to_string())),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_app(&self, app: &str) {
        *self.app.lock().unwrap() = Some(app.to_string());
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BehaviorSampler for FakeSampler {
    async fn sample(&self) -> Result<ActivitySample> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("accessibility permission revoked"));
        }
        Ok(ActivitySample {
            at: Utc::now(),
            active_app: self.app.lock().unwrap().clone(),
            window_count: 4,
            idle_secs: 0.0,
            notification_count: 0,
            app_switches: 0,
        })
    }
}

pub struct FakeCapture {
    bytes: Mutex<Vec<u8>>,
    fail: AtomicBool,
    captures: AtomicU32,
}

impl FakeCapture {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(bytes),
            fail: AtomicBool::new(false),
            captures: AtomicU32::new(0),
        }
    }

    pub fn set_bytes(&self, bytes: Vec<u8>) {
        *self.bytes.lock().unwrap() = bytes;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapture for FakeCapture {
    async fn capture_frame(&self) -> Result<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("screen recording permission denied"));
        }
        Ok(Frame::new(self.bytes.lock().unwrap().clone(), Utc::now()))
    }
}

/// Vec-backed store with injectable failures.
#[derive(Default)]
pub struct MemoryStore {
    pub entries: Mutex<Vec<StressEntry>>,
    pub practices: Mutex<Vec<PracticeSession>>,
    pub dismissals: Mutex<Vec<DismissalEvent>>,
    pub preferences: Mutex<Preferences>,
    /// Number of upcoming writes that fail before writes succeed again.
    failing_writes: AtomicU32,
    failing_reads: AtomicBool,
    write_attempts: AtomicU32,
    after_preferences_load: Mutex<Option<PreferencesEdit>>,
}

type PreferencesEdit = Box<dyn FnOnce(&mut Preferences) + Send>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_failing_reads(&self, fail: bool) {
        self.failing_reads.store(fail, Ordering::SeqCst);
    }

    /// Applies `edit` to the stored row right after the next preferences
    /// read, as if another writer landed between that read and any save.
    pub fn after_next_preferences_load(&self, edit: impl FnOnce(&mut Preferences) + Send + 'static) {
        *self.after_preferences_load.lock().unwrap() = Some(Box::new(edit));
    }

    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn check_write(&self) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("disk I/O error"));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<()> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_entry(&self, entry: &StressEntry) -> Result<()> {
        self.check_write()?;
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn entries_since(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<StressEntry>> {
        self.check_read()?;
        let mut entries: Vec<StressEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| since.map(|since| entry.timestamp >= since).unwrap_or(true))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    async fn append_practice(&self, session: &PracticeSession) -> Result<()> {
        self.check_write()?;
        self.practices.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn close_practice(&self, session_id: &str, close: PracticeClose) -> Result<CloseOutcome> {
        self.check_write()?;
        let mut practices = self.practices.lock().unwrap();
        let Some(session) = practices.iter_mut().find(|s| s.id == session_id) else {
            return Ok(CloseOutcome::NotFound);
        };
        if !session.is_open() {
            return Ok(CloseOutcome::AlreadyClosed(session.clone()));
        }
        session.weather_after = close.weather_after;
        session.was_completed = close.was_completed;
        session.what_helped = close.what_helped;
        session.ended_at = Some(close.ended_at);
        Ok(CloseOutcome::Closed(session.clone()))
    }

    async fn practices(&self) -> Result<Vec<PracticeSession>> {
        self.check_read()?;
        let mut practices = self.practices.lock().unwrap().clone();
        practices.sort_by_key(|session| session.started_at);
        Ok(practices)
    }

    async fn append_dismissal(&self, event: &DismissalEvent) -> Result<()> {
        self.check_write()?;
        self.dismissals.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn dismissals_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<DismissalEvent>> {
        self.check_read()?;
        let mut events: Vec<DismissalEvent> = self
            .dismissals
            .lock()
            .unwrap()
            .iter()
            .filter(|event| since.map(|since| event.timestamp >= since).unwrap_or(true))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }

    async fn load_preferences(&self) -> Result<Preferences> {
        self.check_read()?;
        let mut stored = self.preferences.lock().unwrap();
        let snapshot = stored.clone();
        if let Some(edit) = self.after_preferences_load.lock().unwrap().take() {
            edit(&mut stored);
        }
        Ok(snapshot)
    }

    async fn save_active_hours(&self, hours: Option<ActiveHours>) -> Result<()> {
        self.check_write()?;
        self.preferences.lock().unwrap().active_hours = hours;
        Ok(())
    }

    async fn save_preferred_practices(&self, practices: &[String]) -> Result<()> {
        self.check_write()?;
        self.preferences.lock().unwrap().preferred_practices = practices.to_vec();
        Ok(())
    }

    async fn save_baseline(&self, baseline_json: &str) -> Result<()> {
        self.check_write()?;
        self.preferences.lock().unwrap().baseline_json = Some(baseline_json.to_string());
        Ok(())
    }
}
