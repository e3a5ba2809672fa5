//! Uniform JSON envelopes returned to callers.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

pub const USAGE_HINT: &str = "GET /?prompt=<text>&model=<chatgpt|claude|gemini>&action=<chat|image|test> \
or POST / with JSON {\"prompt\": \"...\", \"model\": \"...\", \"action\": \"...\", \"history\": [{\"role\": \"user\", \"content\": \"...\"}]}";

/// Capabilities advertised by the status payload.
pub const FEATURES: &[&str] = &["chat", "image", "history", "fallback"];

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatEnvelope {
    pub success: bool,
    pub model: String,
    pub response: String,
    pub timestamp: String,
}

impl ChatEnvelope {
    pub fn new(model: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            success: true,
            model: model.into(),
            response: response.into(),
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEnvelope {
    pub success: bool,
    pub model: String,
    pub image_url: String,
    pub prompt: String,
    pub timestamp: String,
}

impl ImageEnvelope {
    pub fn new(
        model: impl Into<String>,
        image_url: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            model: model.into(),
            image_url: image_url.into(),
            prompt: prompt.into(),
            timestamp: timestamp(),
        }
    }
}

/// Static payload for `action=test`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEnvelope {
    pub status: &'static str,
    pub models: Vec<String>,
    pub features: Vec<&'static str>,
    pub timestamp: String,
}

impl StatusEnvelope {
    pub fn online(models: Vec<String>) -> Self {
        Self {
            status: "online",
            models,
            features: FEATURES.to_vec(),
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            model: None,
            usage: None,
            timestamp: timestamp(),
        }
    }
}
