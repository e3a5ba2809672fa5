pub mod gateway;
pub mod health;

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use kite_core::error::GatewayError;
use kite_core::request::GatewayRequest;
use std::any::Any;
use std::collections::HashMap;

/// Read gateway parameters: JSON body for POST (query string when the body
/// is empty), query string for everything else.
pub(crate) fn parse_request(
    method: &Method,
    query: &HashMap<String, String>,
    body: &[u8],
) -> Result<GatewayRequest, GatewayError> {
    if *method == Method::POST && !body.iter().all(u8::is_ascii_whitespace) {
        GatewayRequest::from_json(body)
    } else {
        Ok(GatewayRequest::from_query(query))
    }
}

/// Turn a handler panic into the generic 500 envelope, echoing its message.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown error".to_string()
    };
    tracing::error!(error = %message, "Handler panicked");
    GatewayError::Unexpected(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_core::request::Action;

    #[test]
    fn test_post_reads_body() {
        let query = HashMap::from([("prompt".to_string(), "from query".to_string())]);
        let req = parse_request(&Method::POST, &query, br#"{"prompt":"from body"}"#).unwrap();
        assert_eq!(req.prompt.as_deref(), Some("from body"));
    }

    #[test]
    fn test_post_with_empty_body_reads_query() {
        let query = HashMap::from([("action".to_string(), "test".to_string())]);
        let req = parse_request(&Method::POST, &query, b"  \n").unwrap();
        assert_eq!(req.action, Action::Test);
    }

    #[test]
    fn test_get_ignores_body() {
        let query = HashMap::from([("prompt".to_string(), "q".to_string())]);
        let req = parse_request(&Method::GET, &query, br#"{"prompt":"b"}"#).unwrap();
        assert_eq!(req.prompt.as_deref(), Some("q"));
    }

    #[test]
    fn test_panic_response_is_500() {
        let resp = panic_response(Box::new("boom"));
        assert_eq!(resp.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
