use crate::AppState;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use kite_core::envelope::{ChatEnvelope, ImageEnvelope, StatusEnvelope};
use kite_core::error::GatewayError;
use kite_core::request::{Action, GatewayRequest};
use kite_provider::shape::UpstreamInput;
use std::collections::HashMap;
use std::time::Instant;

/// The single gateway endpoint: pre-flight, status, chat and image.
pub async fn gateway(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }

    let Query(query) = query.map_err(|e| GatewayError::validation(e.body_text()))?;
    let request = super::parse_request(&method, &query, &body)?;

    let label = match request.action {
        Action::Test => "test",
        Action::Image => state.image.model_name(),
        Action::Chat => state.registry.resolve(request.model.as_deref()),
    };
    state.metrics.record_request(label);

    let start = Instant::now();
    let result = dispatch(&state, request).await;
    state.metrics.record_latency_ms(start.elapsed().as_millis());
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn dispatch(state: &AppState, request: GatewayRequest) -> Result<Response, GatewayError> {
    match request.action {
        Action::Test => {
            let mut models = state.registry.model_names();
            models.push(state.image.model_name().to_string());
            Ok(Json(StatusEnvelope::online(models)).into_response())
        }
        Action::Image => {
            let prompt = request.require_prompt()?;
            let reply = state.image.generate(prompt).await?;
            Ok(Json(ImageEnvelope::new(reply.model, reply.image_url, prompt)).into_response())
        }
        Action::Chat => {
            let prompt = request.require_prompt()?.to_string();
            let model = request.model.as_deref();

            let input = UpstreamInput {
                prompt,
                history: request.history,
                image_url: request.image_url,
            };
            let reply = state.chat.complete(model, &input).await?;
            Ok(Json(ChatEnvelope::new(reply.model, reply.text)).into_response())
        }
    }
}
