//! Classification gateway
//!
//! Wraps a `VisionClassifier` with the cycle's contract: a bounded call, one
//! retry, and validation of whatever came back. The network call itself lives
//! behind the trait (see `http::HttpVisionClassifier`).

pub mod http;

pub use http::HttpVisionClassifier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AgentError;
use crate::models::{EffortLevel, Nudge, ToolContext, Weather};

/// First attempt plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("malformed answer: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    /// Encoded frame, already downscaled for upload.
    pub image: Arc<Vec<u8>>,
    pub tool_context: Arc<ToolContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub weather: Weather,
    pub confidence: f64,
    pub signals: Vec<String>,
    pub nudge: Option<Nudge>,
    pub thinking: Option<String>,
    pub effort_hint: Option<EffortLevel>,
}

impl Classification {
    /// The suggested nudge, if confident enough to act on.
    pub fn nudge_candidate(&self, confidence_floor: f64) -> Option<&Nudge> {
        if self.confidence < confidence_floor {
            return None;
        }
        self.nudge.as_ref()
    }
}

#[async_trait]
pub trait VisionClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest)
        -> Result<Classification, ClassifierError>;
}

#[derive(Debug, Clone)]
pub struct GatewayAnswer {
    pub classification: Classification,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct ClassificationGateway {
    classifier: Arc<dyn VisionClassifier>,
    timeout: Duration,
}

impl ClassificationGateway {
    pub fn new(classifier: Arc<dyn VisionClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    /// Returns the last failure once every attempt has failed.
    pub async fn classify(&self, request: ClassificationRequest) -> Result<GatewayAnswer, AgentError> {
        let mut last_error = AgentError::ClassificationTransport("no attempt made".into());

        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = tokio::time::timeout(self.timeout, self.classifier.classify(&request)).await;
            let error = match outcome {
                Ok(Ok(classification)) => match validate(classification) {
                    Ok(classification) => {
                        return Ok(GatewayAnswer {
                            classification,
                            attempts: attempt,
                        })
                    }
                    Err(err) => err,
                },
                Ok(Err(ClassifierError::Transport(message))) => {
                    AgentError::ClassificationTransport(message)
                }
                Ok(Err(ClassifierError::Malformed(message))) => {
                    AgentError::ClassificationMalformed(message)
                }
                Err(_) => AgentError::ClassificationTimeout(self.timeout.as_secs()),
            };

            warn!("classification attempt {attempt}/{MAX_ATTEMPTS} failed: {error}");
            last_error = error;
        }

        Err(last_error)
    }
}

fn validate(mut classification: Classification) -> Result<Classification, AgentError> {
    if !classification.confidence.is_finite() || !(0.0..=1.0).contains(&classification.confidence) {
        return Err(AgentError::ClassificationMalformed(format!(
            "confidence {} outside [0, 1]",
            classification.confidence
        )));
    }

    if let Some(nudge) = &classification.nudge {
        if nudge.message.trim().is_empty() {
            classification.nudge = None;
        }
    }
    classification.signals.retain(|signal| !signal.trim().is_empty());
    classification.thinking = classification
        .thinking
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(classification)
}
