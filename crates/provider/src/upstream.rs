use crate::normalize::{FieldPath, normalize};
use crate::shape::{UpstreamInput, build_payload};
use async_trait::async_trait;
use kite_core::config::{RequestShape, UpstreamConfig};
use kite_core::error::UpstreamError;
use kite_core::request::truncate_history;

/// One candidate in a fallback chain.
///
/// An attempt either yields the normalized value or explains why it could
/// not; the invoker treats every error the same way and moves on.
#[async_trait]
pub trait UpstreamStrategy: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Where the attempt is sent, for display.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    async fn attempt(&self, input: &UpstreamInput) -> Result<String, UpstreamError>;
}

/// An upstream reached with a single JSON POST.
pub struct HttpUpstream {
    name: String,
    url: String,
    shape: RequestShape,
    upstream_model: Option<String>,
    paths: Vec<FieldPath>,
    /// `None` forwards the full history.
    history_limit: Option<usize>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Build from configuration. `default_paths` applies when the entry does
    /// not list its own `response-paths`.
    pub fn from_config(
        cfg: &UpstreamConfig,
        client: reqwest::Client,
        default_paths: Vec<FieldPath>,
        history_limit: usize,
        api_key: Option<String>,
    ) -> Self {
        let paths = if cfg.response_paths.is_empty() {
            default_paths
        } else {
            crate::normalize::parse_paths(&cfg.response_paths)
        };
        Self {
            name: cfg.name.clone(),
            url: cfg.url.clone(),
            shape: cfg.shape,
            upstream_model: cfg.upstream_model.clone(),
            paths,
            history_limit: cfg.truncate_history.then_some(history_limit),
            api_key,
            client,
        }
    }

    fn build_request(&self, input: &UpstreamInput) -> reqwest::RequestBuilder {
        let history = match self.history_limit {
            Some(limit) => truncate_history(&input.history, limit),
            None => &input.history[..],
        };
        let payload = build_payload(self.shape, input, history, self.upstream_model.as_deref());

        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(ref key) = self.api_key {
            req = req.header("x-goog-api-key", key);
        }
        req
    }
}

#[async_trait]
impl UpstreamStrategy for HttpUpstream {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.url)
    }

    async fn attempt(&self, input: &UpstreamInput) -> Result<String, UpstreamError> {
        let resp = self.build_request(input).send().await?;
        let body = handle_response(resp).await?;
        normalize(&body, &self.paths).ok_or(UpstreamError::Unusable)
    }
}

/// Check status and parse the body as JSON.
pub async fn handle_response(resp: reqwest::Response) -> Result<serde_json::Value, UpstreamError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
