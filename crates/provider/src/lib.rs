pub mod chat;
pub mod image;
pub mod invoker;
pub mod normalize;
pub mod registry;
pub mod shape;
pub mod upstream;

use chat::ChatService;
use image::ImageService;
use invoker::FallbackInvoker;
use kite_core::config::Config;
use kite_core::metrics::Metrics;
use registry::UpstreamRegistry;
use std::sync::Arc;
use std::time::Duration;

const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// The client-level timeout sits past the per-attempt deadline so that slow
/// upstreams surface as `UpstreamError::Timeout` from the invoker.
pub fn client_timeout(deadline: Duration) -> Duration {
    deadline + CLIENT_TIMEOUT_SLACK
}

/// Everything the HTTP layer needs to serve chat and image requests.
pub struct Providers {
    pub registry: Arc<UpstreamRegistry>,
    pub chat: Arc<ChatService>,
    pub image: Arc<ImageService>,
}

/// Build the registry and handlers from configuration. The Gemini key is
/// resolved here, once, and only its presence is consulted afterwards.
pub fn build_providers(config: &Config, metrics: Arc<Metrics>) -> Result<Providers, anyhow::Error> {
    let deadline = Duration::from_secs(config.request_timeout);
    let client = kite_core::http_client::build_http_client(
        Duration::from_secs(config.connect_timeout),
        client_timeout(deadline),
    )?;

    let registry = Arc::new(UpstreamRegistry::from_config(
        config,
        client.clone(),
        config.resolve_gemini_key(),
    ));
    let invoker = FallbackInvoker::new(deadline, metrics);
    let chat = Arc::new(ChatService::new(registry.clone(), invoker.clone()));
    let image = Arc::new(ImageService::from_config(&config.image, client, invoker));

    Ok(Providers {
        registry,
        chat,
        image,
    })
}
