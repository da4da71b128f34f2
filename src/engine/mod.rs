//! Per-cycle orchestration: sample, classify, decide, record.

mod cycle;
pub mod inputs;
pub mod refresh;
pub mod state;

pub use cycle::NudgeEngine;
pub use inputs::{EngineInputs, PendingInputs};
pub use refresh::{rebuild_aggregates, Aggregates};
pub use state::{CycleOutcome, CyclePhase, CycleReport, SkipReason};
