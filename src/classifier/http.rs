use std::env;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use super::{Classification, ClassificationRequest, ClassifierError, VisionClassifier};
use crate::errors::AgentError;
use crate::models::{EffortLevel, Nudge, Weather};
use crate::settings::ClassifierSettings;

pub const INSTRUCTIONS: &str = r#"You look at one screenshot of the user's screen and infer their inner weather.
Answer with a single JSON object:
{"weather": "clear" | "cloudy" | "stormy",
 "confidence": number between 0 and 1,
 "signals": [short observations that drove the call],
 "nudge": null | {"type": practice id, "message": one kind sentence, "practiceId": optional},
 "thinking": one or two sentences of reasoning,
 "effort": "low" | "high" | "max"}
Prefer practices from toolContext.preferredPractices, in order. Only suggest a nudge when it would genuinely help."#;

/// Posts frames to a JSON vision endpoint.
pub struct HttpVisionClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpVisionClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AgentError::ClassificationTransport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_settings(settings: &ClassifierSettings, timeout: Duration) -> Result<Self, AgentError> {
        let endpoint = settings
            .endpoint
            .clone()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| AgentError::ConfigurationMissing("classifier.endpoint".into()))?;
        let api_key = env::var(&settings.api_key_env).ok().filter(|key| !key.is_empty());
        Self::new(endpoint, settings.model.clone(), api_key, timeout)
    }

    fn payload(&self, request: &ClassificationRequest) -> Value {
        json!({
            "model": self.model,
            "instructions": INSTRUCTIONS,
            "image": {
                "mediaType": "image/png",
                "data": STANDARD.encode(request.image.as_slice()),
            },
            "toolContext": &*request.tool_context,
        })
    }
}

#[async_trait]
impl VisionClassifier for HttpVisionClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError> {
        let mut call = self.client.post(&self.endpoint).json(&self.payload(request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let res = call
            .send()
            .await
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClassifierError::Transport(format!("{status}: {body}")));
        }

        let body: Value = res
            .json()
            .await
            .map_err(|err| ClassifierError::Malformed(err.to_string()))?;
        parse_answer(&body)
    }
}

/// Accepts the answer object directly or wrapped as JSON text under
/// `output_text` / `content`, which is how chat-style endpoints return it.
pub fn parse_answer(body: &Value) -> Result<Classification, ClassifierError> {
    for key in ["output_text", "content"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            let inner: Value = serde_json::from_str(strip_code_fence(text))
                .map_err(|err| ClassifierError::Malformed(format!("{key} is not JSON: {err}")))?;
            return parse_answer(&inner);
        }
    }

    let weather = body
        .get("weather")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifierError::Malformed("missing weather".into()))?;
    let weather = Weather::from_label(weather)
        .ok_or_else(|| ClassifierError::Malformed(format!("unknown weather '{weather}'")))?;

    let confidence = body
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| ClassifierError::Malformed("missing confidence".into()))?;

    let signals = body
        .get("signals")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let nudge = match body.get("nudge") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(parse_nudge(raw)?),
    };

    let thinking = body
        .get("thinking")
        .and_then(Value::as_str)
        .map(str::to_string);

    let effort_hint = body
        .get("effort")
        .and_then(Value::as_str)
        .and_then(EffortLevel::from_label);

    Ok(Classification {
        weather,
        confidence,
        signals,
        nudge,
        thinking,
        effort_hint,
    })
}

fn parse_nudge(raw: &Value) -> Result<Nudge, ClassifierError> {
    let nudge_type = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifierError::Malformed("nudge without type".into()))?;
    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifierError::Malformed("nudge without message".into()))?;
    let practice_id = raw
        .get("practiceId")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Nudge {
        nudge_type: nudge_type.to_string(),
        message: message.to_string(),
        practice_id,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
