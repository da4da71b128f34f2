//! Derived inputs the engine reads every cycle.
//!
//! Setters on the monitor stage replacements in `PendingInputs`; the loop
//! applies them between cycles, so a cycle always sees one consistent set.

use std::sync::Arc;

use crate::models::{ActiveHours, ToolContext};
use crate::suppression::LearnedPatterns;

#[derive(Debug, Clone, Default)]
pub struct EngineInputs {
    pub patterns: Arc<LearnedPatterns>,
    pub preferred_practices: Arc<Vec<String>>,
    pub tool_context: Arc<ToolContext>,
    pub active_hours: Option<ActiveHours>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingInputs {
    pub patterns: Option<Arc<LearnedPatterns>>,
    pub preferred_practices: Option<Arc<Vec<String>>>,
    pub tool_context: Option<Arc<ToolContext>>,
    /// `Some(None)` clears the window.
    pub active_hours: Option<Option<ActiveHours>>,
}

impl PendingInputs {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_none()
            && self.preferred_practices.is_none()
            && self.tool_context.is_none()
            && self.active_hours.is_none()
    }

    /// Moves every staged value into `inputs`, leaving `self` empty.
    pub fn apply_to(&mut self, inputs: &mut EngineInputs) {
        if let Some(patterns) = self.patterns.take() {
            inputs.patterns = patterns;
        }
        if let Some(preferred) = self.preferred_practices.take() {
            inputs.preferred_practices = preferred;
        }
        if let Some(context) = self.tool_context.take() {
            inputs.tool_context = context;
        }
        if let Some(hours) = self.active_hours.take() {
            inputs.active_hours = hours;
        }
    }
}
