pub mod handler;
pub mod middleware;

use axum::http::{HeaderValue, Method, header};
use axum::{Router, middleware as axum_mw};
use kite_core::config::Config;
use kite_core::metrics::Metrics;
use kite_provider::Providers;
use kite_provider::chat::ChatService;
use kite_provider::image::ImageService;
use kite_provider::registry::UpstreamRegistry;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<UpstreamRegistry>,
    pub chat: Arc<ChatService>,
    pub image: Arc<ImageService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Arc<Config>, providers: Providers, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            registry: providers.registry,
            chat: providers.chat,
            image: providers.image,
            metrics,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit_bytes = state.config.body_limit_mb * 1024 * 1024;

    let public_routes = Router::new()
        .route("/health", axum::routing::get(handler::health::health))
        .route("/metrics", axum::routing::get(handler::health::metrics));

    // The gateway answers every method on both paths.
    let gateway_routes = Router::new()
        .route("/", axum::routing::any(handler::gateway::gateway))
        .route("/api", axum::routing::any(handler::gateway::gateway))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Compose, then global middleware layers (outer → inner)
    Router::new()
        .merge(public_routes)
        .merge(gateway_routes)
        .layer(axum_mw::from_fn(
            middleware::request_logging::request_logging_middleware,
        ))
        .layer(axum_mw::from_fn(
            middleware::request_context::request_context_middleware,
        ))
        .layer(CatchPanicLayer::custom(handler::panic_response))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
