use crate::invoker::FallbackInvoker;
use crate::normalize::{IMAGE_PATHS, parse_paths};
use crate::shape::UpstreamInput;
use crate::upstream::{HttpUpstream, UpstreamStrategy};
use kite_core::config::ImageConfig;
use kite_core::error::GatewayError;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReply {
    pub model: String,
    pub image_url: String,
}

/// Image generation by URL construction, with one upstream as fallback.
pub struct ImageService {
    model_name: String,
    base_url: String,
    width: u32,
    height: u32,
    flags: BTreeMap<String, String>,
    prefer_upstream: bool,
    fallback: Option<Arc<dyn UpstreamStrategy>>,
    invoker: FallbackInvoker,
}

impl ImageService {
    pub fn from_config(cfg: &ImageConfig, client: reqwest::Client, invoker: FallbackInvoker) -> Self {
        let fallback = cfg.fallback.as_ref().map(|entry| {
            Arc::new(HttpUpstream::from_config(
                entry,
                client,
                parse_paths(IMAGE_PATHS),
                0,
                None,
            )) as Arc<dyn UpstreamStrategy>
        });
        Self {
            model_name: cfg.model_name.clone(),
            base_url: cfg.base_url.clone(),
            width: cfg.width,
            height: cfg.height,
            flags: cfg.flags.clone(),
            prefer_upstream: cfg.prefer_upstream,
            fallback,
            invoker,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn UpstreamStrategy>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// `{base}{percent-encoded prompt}?width=..&height=..&{flags}`. The URL
    /// itself triggers generation when the caller fetches it.
    pub fn direct_url(&self, prompt: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(&format!(
            "{}{}",
            self.base_url,
            urlencoding::encode(prompt)
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &self.width.to_string())
                .append_pair("height", &self.height.to_string());
            for (key, value) in &self.flags {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    pub async fn generate(&self, prompt: &str) -> Result<ImageReply, GatewayError> {
        if !self.prefer_upstream {
            match self.direct_url(prompt) {
                Ok(image_url) => {
                    return Ok(ImageReply {
                        model: self.model_name.clone(),
                        image_url,
                    });
                }
                Err(e) => {
                    tracing::warn!(base_url = %self.base_url, error = %e, "Image URL construction failed, using fallback upstream");
                }
            }
        }

        let Some(ref fallback) = self.fallback else {
            tracing::error!("No image fallback upstream configured");
            return Err(GatewayError::ImageExhausted);
        };

        let chain = std::slice::from_ref(fallback);
        match self.invoker.invoke(chain, &UpstreamInput::new(prompt)).await {
            Some(served) => Ok(ImageReply {
                model: self.model_name.clone(),
                image_url: served.value,
            }),
            None => Err(GatewayError::ImageExhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::tests::{Behavior, Scripted};
    use kite_core::metrics::Metrics;
    use std::time::Duration;

    fn service(cfg: ImageConfig) -> ImageService {
        let invoker = FallbackInvoker::new(Duration::from_millis(200), Arc::new(Metrics::new()));
        ImageService::from_config(&cfg, reqwest::Client::new(), invoker)
    }

    #[test]
    fn test_direct_url_encodes_prompt_and_dimensions() {
        let url = service(ImageConfig::default()).direct_url("a red fox").unwrap();
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/a%20red%20fox?width=1024&height=1024&enhance=true&nologo=true"
        );
    }

    #[test]
    fn test_direct_url_escapes_reserved_characters() {
        let url = service(ImageConfig::default())
            .direct_url("cats & dogs?/#")
            .unwrap();
        assert!(url.starts_with("https://image.pollinations.ai/prompt/cats%20%26%20dogs%3F%2F%23?"));
    }

    #[tokio::test]
    async fn test_generate_primary_path_never_calls_fallback() {
        let fallback = Scripted::new("img", Behavior::Reply("https://fallback/img.png"));
        let svc = service(ImageConfig::default()).with_fallback(fallback.clone());
        let reply = svc.generate("a red fox").await.unwrap();
        assert_eq!(reply.model, "image");
        assert!(reply.image_url.contains("a%20red%20fox"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_base_url_uses_fallback() {
        let cfg = ImageConfig {
            base_url: "not a url/".to_string(),
            ..ImageConfig::default()
        };
        let fallback = Scripted::new("img", Behavior::Reply("https://fallback/img.png"));
        let svc = service(cfg).with_fallback(fallback.clone());
        let reply = svc.generate("a red fox").await.unwrap();
        assert_eq!(reply.image_url, "https://fallback/img.png");
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_prefer_upstream_and_failure() {
        let cfg = ImageConfig {
            prefer_upstream: true,
            ..ImageConfig::default()
        };
        let fallback = Scripted::new("img", Behavior::Fail);
        let svc = service(cfg).with_fallback(fallback.clone());
        let err = svc.generate("a red fox").await.unwrap_err();
        assert!(matches!(err, GatewayError::ImageExhausted));
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_configured() {
        let cfg = ImageConfig {
            prefer_upstream: true,
            ..ImageConfig::default()
        };
        assert!(service(cfg).generate("x").await.is_err());
    }
}
