use crate::envelope::{ErrorBody, USAGE_HINT};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Errors surfaced to callers of the gateway endpoint.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation { message: String },

    #[error("all upstream providers failed for model {model}")]
    ChatExhausted { model: String },

    #[error("all image providers failed")]
    ImageExhausted,

    #[error("{0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::ChatExhausted { .. } | Self::ImageExhausted | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Invalid request",
            Self::ChatExhausted { .. } => "Chat generation failed",
            Self::ImageExhausted => "Image generation failed",
            Self::Unexpected(_) => "Internal server error",
        }
    }

    /// Build the JSON body returned to the caller.
    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.headline(), self.to_string());
        match self {
            Self::Validation { .. } => body.usage = Some(USAGE_HINT.to_string()),
            Self::ChatExhausted { model } => body.model = Some(model.clone()),
            _ => {}
        }
        body
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

/// Reasons a single upstream attempt produced nothing usable.
///
/// These never reach the caller; the fallback invoker logs them and moves on
/// to the next candidate.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream returned status {status}")]
    Status { status: u16 },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("no usable field in response")]
    Unusable,

    #[error("request could not be built: {0}")]
    Build(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(format!("JSON error: {e}"))
    }
}
