//! Inbound request model shared by the router and the handlers.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the caller asked the gateway to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Chat,
    Image,
    Test,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Image => "image",
            Self::Test => "test",
        }
    }

    /// Parse an action name. Anything unrecognized is a chat request.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "test" => Self::Test,
            _ => Self::Chat,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Parameters of a single gateway call, regardless of whether they arrived in
/// the query string or in a JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRequest {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub action: Action,
    pub history: Vec<ChatTurn>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBody {
    prompt: Option<String>,
    model: Option<String>,
    action: Option<String>,
    history: Option<serde_json::Value>,
    #[serde(rename = "imageUrl", alias = "image_url")]
    image_url: Option<String>,
}

impl GatewayRequest {
    /// Build a request from a POST body.
    pub fn from_json(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: RawBody = serde_json::from_slice(body)
            .map_err(|e| GatewayError::validation(format!("invalid JSON body: {e}")))?;

        Ok(Self {
            prompt: non_blank(raw.prompt),
            model: non_blank(raw.model),
            action: raw.action.as_deref().map(Action::parse).unwrap_or_default(),
            history: raw.history.as_ref().map(parse_history).unwrap_or_default(),
            image_url: non_blank(raw.image_url),
        })
    }

    /// Build a request from query-string parameters. `history` is expected to
    /// be a JSON-encoded array; anything else yields an empty history.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let history = params
            .get("history")
            .and_then(|h| serde_json::from_str::<serde_json::Value>(h).ok())
            .map(|v| parse_history(&v))
            .unwrap_or_default();

        Self {
            prompt: non_blank(params.get("prompt").cloned()),
            model: non_blank(params.get("model").cloned()),
            action: params
                .get("action")
                .map(|a| Action::parse(a))
                .unwrap_or_default(),
            history,
            image_url: non_blank(
                params
                    .get("imageUrl")
                    .or_else(|| params.get("image_url"))
                    .cloned(),
            ),
        }
    }

    /// Return the prompt, or a validation error when it is required and absent.
    pub fn require_prompt(&self) -> Result<&str, GatewayError> {
        self.prompt
            .as_deref()
            .ok_or_else(|| GatewayError::validation("Prompt is required"))
    }
}

/// Keep well-formed `{role, content}` entries; skip anything else.
fn parse_history(value: &serde_json::Value) -> Vec<ChatTurn> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let content = item.get("content")?.as_str()?;
            let role = item.get("role").and_then(|r| r.as_str()).unwrap_or("user");
            Some(ChatTurn::new(role, content))
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Keep only the most recent `limit` turns.
pub fn truncate_history(history: &[ChatTurn], limit: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("image"), Action::Image);
        assert_eq!(Action::parse("TEST"), Action::Test);
        assert_eq!(Action::parse("chat"), Action::Chat);
        assert_eq!(Action::parse("dance"), Action::Chat);
    }

    #[test]
    fn test_from_json_full() {
        let body = br#"{
            "prompt": "hello",
            "model": "claude",
            "action": "chat",
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hey"}
            ],
            "imageUrl": "https://example.com/cat.png"
        }"#;
        let req = GatewayRequest::from_json(body).unwrap();
        assert_eq!(req.prompt.as_deref(), Some("hello"));
        assert_eq!(req.model.as_deref(), Some("claude"));
        assert_eq!(req.action, Action::Chat);
        assert_eq!(req.history.len(), 2);
        assert_eq!(req.history[1], ChatTurn::new("assistant", "hey"));
        assert_eq!(req.image_url.as_deref(), Some("https://example.com/cat.png"));
    }

    #[test]
    fn test_from_json_rejects_malformed_body() {
        let err = GatewayRequest::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn test_from_json_skips_malformed_history_entries() {
        let body = br#"{"prompt":"x","history":[{"role":"user"},{"content":"kept"},42]}"#;
        let req = GatewayRequest::from_json(body).unwrap();
        assert_eq!(req.history, vec![ChatTurn::new("user", "kept")]);
    }

    #[test]
    fn test_from_query() {
        let params = HashMap::from([
            ("prompt".to_string(), "a red fox".to_string()),
            ("action".to_string(), "image".to_string()),
            (
                "history".to_string(),
                r#"[{"role":"user","content":"before"}]"#.to_string(),
            ),
        ]);
        let req = GatewayRequest::from_query(&params);
        assert_eq!(req.prompt.as_deref(), Some("a red fox"));
        assert_eq!(req.action, Action::Image);
        assert_eq!(req.history.len(), 1);
        assert!(req.model.is_none());
    }

    #[test]
    fn test_from_query_bad_history_is_empty() {
        let params = HashMap::from([
            ("prompt".to_string(), "x".to_string()),
            ("history".to_string(), "not-json".to_string()),
        ]);
        assert!(GatewayRequest::from_query(&params).history.is_empty());
    }

    #[test]
    fn test_blank_prompt_is_missing() {
        let req = GatewayRequest::from_json(br#"{"prompt":"   "}"#).unwrap();
        assert!(req.require_prompt().is_err());
    }

    #[test]
    fn test_truncate_history_keeps_most_recent() {
        let history: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn::new("user", format!("turn {i}")))
            .collect();
        let kept = truncate_history(&history, 5);
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[0].content, "turn 5");
        assert_eq!(kept[4].content, "turn 9");

        assert_eq!(truncate_history(&history[..3], 5).len(), 3);
    }
}
