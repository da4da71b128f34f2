//! Error taxonomy for the nudge engine.
//!
//! None of these are fatal to monitoring: the loop degrades the current cycle
//! and resumes on the next tick.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("screen capture failed: {0}")]
    CaptureFailure(String),

    #[error("behavior sampler failed: {0}")]
    SamplerFailure(String),

    #[error("classification timed out after {0}s")]
    ClassificationTimeout(u64),

    #[error("classification answer malformed: {0}")]
    ClassificationMalformed(String),

    #[error("classification transport failed: {0}")]
    ClassificationTransport(String),

    #[error("store I/O failed: {0}")]
    StoreIo(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("practice session {0} not found")]
    UnknownPractice(String),

    #[error("practice session {0} was already closed")]
    PracticeAlreadyClosed(String),

    #[error("monitoring already active")]
    AlreadyRunning,
}

impl AgentError {
    pub fn store(err: anyhow::Error) -> Self {
        AgentError::StoreIo(format!("{err:#}"))
    }

    /// Classification failures degrade a cycle; they are the ones worth a retry.
    pub fn is_classification_failure(&self) -> bool {
        matches!(
            self,
            AgentError::ClassificationTimeout(_)
                | AgentError::ClassificationMalformed(_)
                | AgentError::ClassificationTransport(_)
        )
    }
}
