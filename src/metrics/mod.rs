mod types;

pub use types::{CycleMetrics, MetricsSnapshot, SystemMetrics};

use std::collections::BTreeMap;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_CYCLES: usize = 20;

pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_cycles: Vec<CycleMetrics>,
    cycle_count: u64,
    outcome_counts: BTreeMap<String, u64>,
    system: System,
    pid: Pid,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // CPU usage is a delta between refreshes, so take the first one now.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_cycles: Vec::with_capacity(MAX_RECENT_CYCLES),
                cycle_count: 0,
                outcome_counts: BTreeMap::new(),
                system,
                pid,
            })),
        }
    }

    /// Stamps `metrics` with process usage and keeps it in the recent window.
    pub async fn record_cycle(&self, mut metrics: CycleMetrics) {
        let mut state = self.inner.lock().await;
        let (cpu_percent, memory_mb) = state.sample();
        metrics.cpu_percent = cpu_percent;
        metrics.memory_mb = memory_mb;

        state.cycle_count += 1;
        let kind = metrics
            .outcome
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();
        *state.outcome_counts.entry(kind).or_default() += 1;

        state.recent_cycles.push(metrics);
        if state.recent_cycles.len() > MAX_RECENT_CYCLES {
            state.recent_cycles.remove(0);
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let (cpu_percent, memory_mb) = state.sample();

        MetricsSnapshot {
            system: SystemMetrics {
                cpu_percent,
                memory_mb,
            },
            recent_cycles: state.recent_cycles.clone(),
            cycle_count: state.cycle_count,
            outcome_counts: state.outcome_counts.clone(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.recent_cycles.clear();
        state.cycle_count = 0;
        state.outcome_counts.clear();
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}

impl MetricsState {
    fn sample(&mut self) -> (f32, f64) {
        let pid = self.pid;
        self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        match self.system.process(pid) {
            Some(process) => (
                process.cpu_usage(),
                process.memory() as f64 / 1024.0 / 1024.0,
            ),
            None => (0.0, 0.0),
        }
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
