use crate::invoker::FallbackInvoker;
use crate::registry::UpstreamRegistry;
use crate::shape::UpstreamInput;
use kite_core::error::GatewayError;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// The resolved model the caller asked for.
    pub model: String,
    pub text: String,
    /// The upstream that actually answered. Logged, not returned to callers.
    pub upstream: String,
}

/// Chat completions over the registry's fallback chains.
pub struct ChatService {
    registry: Arc<UpstreamRegistry>,
    invoker: FallbackInvoker,
}

impl ChatService {
    pub fn new(registry: Arc<UpstreamRegistry>, invoker: FallbackInvoker) -> Self {
        Self { registry, invoker }
    }

    pub fn registry(&self) -> &UpstreamRegistry {
        &self.registry
    }

    /// Try the model's chain, then its fallback model's chain. Only total
    /// exhaustion is an error.
    pub async fn complete(
        &self,
        requested_model: Option<&str>,
        input: &UpstreamInput,
    ) -> Result<ChatReply, GatewayError> {
        let model = self.registry.resolve(requested_model).to_string();

        for route in self.registry.chain(&model) {
            if route.name != model {
                tracing::info!(model = %model, fallback = %route.name, "Falling back to another model's upstreams");
            }
            if route.upstreams.is_empty() {
                tracing::debug!(model = %route.name, "Model has no usable upstreams");
                continue;
            }
            if let Some(served) = self.invoker.invoke(&route.upstreams, input).await {
                tracing::info!(model = %model, upstream = %served.upstream, "Chat served");
                return Ok(ChatReply {
                    model,
                    text: served.value,
                    upstream: served.upstream,
                });
            }
        }

        tracing::error!(model = %model, "All chat upstreams failed");
        Err(GatewayError::ChatExhausted { model })
    }
}
