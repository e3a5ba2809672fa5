//! Provider-specific request payloads.

use kite_core::config::RequestShape;
use kite_core::request::ChatTurn;
use serde_json::{Value, json};

/// What every upstream receives, before shaping.
#[derive(Debug, Clone, Default)]
pub struct UpstreamInput {
    pub prompt: String,
    pub history: Vec<ChatTurn>,
    pub image_url: Option<String>,
}

impl UpstreamInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Build the JSON body for `shape`. `history` must already be truncated.
pub fn build_payload(
    shape: RequestShape,
    input: &UpstreamInput,
    history: &[ChatTurn],
    upstream_model: Option<&str>,
) -> Value {
    match shape {
        RequestShape::Query => {
            let mut body = json!({
                "query": input.prompt,
                "history": history,
            });
            if let Some(ref url) = input.image_url {
                body["imageUrl"] = json!(url);
            }
            body
        }
        RequestShape::Prompt => json!({ "prompt": input.prompt }),
        RequestShape::Messages => {
            let mut messages: Vec<Value> = history
                .iter()
                .map(|t| json!({"role": t.role, "content": t.content}))
                .collect();
            let content = match input.image_url {
                Some(ref url) => json!([
                    {"type": "text", "text": input.prompt},
                    {"type": "image_url", "image_url": {"url": url}},
                ]),
                None => json!(input.prompt),
            };
            messages.push(json!({"role": "user", "content": content}));

            let mut body = json!({ "messages": messages });
            if let Some(model) = upstream_model {
                body["model"] = json!(model);
            }
            body
        }
        RequestShape::Gemini => {
            let mut contents: Vec<Value> = history
                .iter()
                .map(|t| json!({"role": gemini_role(&t.role), "parts": [{"text": t.content}]}))
                .collect();
            contents.push(json!({"role": "user", "parts": [{"text": input.prompt}]}));
            json!({ "contents": contents })
        }
    }
}

fn gemini_role(role: &str) -> &'static str {
    match role {
        "assistant" | "model" | "bot" => "model",
        _ => "user",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;

    fn input_with_history() -> (UpstreamInput, Vec<ChatTurn>) {
        let history = vec![
            ChatTurn::new("user", "hi"),
            ChatTurn::new("assistant", "hello"),
        ];
        let input = UpstreamInput {
            prompt: "how are you?".into(),
            history: history.clone(),
            image_url: None,
        };
        (input, history)
    }

    #[test]
    fn test_query_shape() {
        let (input, history) = input_with_history();
        let body = build_payload(RequestShape::Query, &input, &history, None);
        assert_json_eq!(
            body,
            json!({
                "query": "how are you?",
                "history": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            })
        );
    }

    #[test]
    fn test_prompt_shape_ignores_history() {
        let (input, history) = input_with_history();
        let body = build_payload(RequestShape::Prompt, &input, &history, Some("ignored"));
        assert_json_eq!(body, json!({"prompt": "how are you?"}));
    }

    #[test]
    fn test_messages_shape() {
        let (input, history) = input_with_history();
        let body = build_payload(RequestShape::Messages, &input, &history, Some("openai"));
        assert_json_eq!(
            body,
            json!({
                "model": "openai",
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "how are you?"}
                ]
            })
        );
    }

    #[test]
    fn test_messages_shape_with_image() {
        let input = UpstreamInput {
            prompt: "what is this?".into(),
            history: Vec::new(),
            image_url: Some("https://example.com/cat.png".into()),
        };
        let body = build_payload(RequestShape::Messages, &input, &[], None);
        assert_json_eq!(
            body,
            json!({
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "what is this?"},
                        {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_gemini_shape_maps_roles() {
        let (input, history) = input_with_history();
        let body = build_payload(RequestShape::Gemini, &input, &history, None);
        assert_json_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "how are you?"}]}
                ]
            })
        );
    }
}
