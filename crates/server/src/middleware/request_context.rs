use axum::{extract::Request, middleware::Next, response::Response};
use kite_core::context::RequestContext;

/// Middleware that injects a `RequestContext` as an axum Extension.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
