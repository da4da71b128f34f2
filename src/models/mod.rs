pub mod behavior;
pub mod nudge;
pub mod preferences;
pub mod records;
pub mod tool_context;
pub mod weather;

pub use behavior::{ActivitySample, BehaviorMetrics};
pub use nudge::{EffortLevel, IssuedNudge, Nudge, SilenceDecision, SilenceReason};
pub use preferences::{ActiveHours, Preferences};
pub use records::{
    CloseOutcome, DismissalEvent, DismissalType, PracticeClose, PracticeSession, StressEntry,
};
pub use tool_context::ToolContext;
pub use weather::Weather;
