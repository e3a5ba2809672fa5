use crate::normalize::default_paths;
use crate::upstream::{HttpUpstream, UpstreamStrategy};
use kite_core::config::{Config, UpstreamConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The ordered candidates for one logical model.
pub struct ModelRoute {
    pub name: String,
    pub upstreams: Vec<Arc<dyn UpstreamStrategy>>,
    /// Model whose chain is tried after this one is exhausted.
    pub fallback_model: Option<String>,
    /// Upstreams left out at build time because they need a missing credential.
    pub skipped: Vec<String>,
}

impl ModelRoute {
    pub fn new(name: impl Into<String>, upstreams: Vec<Arc<dyn UpstreamStrategy>>) -> Self {
        Self {
            name: name.into(),
            upstreams,
            fallback_model: None,
            skipped: Vec::new(),
        }
    }

    pub fn with_fallback(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }
}

/// Immutable model → upstream table, built once at startup and shared
/// read-only by every request.
pub struct UpstreamRegistry {
    routes: BTreeMap<String, ModelRoute>,
    aliases: HashMap<String, String>,
    default_model: String,
    credential_present: bool,
}

impl UpstreamRegistry {
    pub fn new(default_model: impl Into<String>, routes: Vec<ModelRoute>) -> Self {
        Self {
            routes: routes.into_iter().map(|r| (r.name.clone(), r)).collect(),
            aliases: HashMap::new(),
            default_model: default_model.into(),
            credential_present: false,
        }
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Build every configured chain. Upstreams that require a credential are
    /// dropped when `gemini_key` is `None`; the owning model's fallback then
    /// serves its requests.
    pub fn from_config(config: &Config, client: reqwest::Client, gemini_key: Option<String>) -> Self {
        let credential_present = gemini_key.is_some();
        let routes = config
            .models
            .iter()
            .map(|(name, model)| {
                let mut upstreams: Vec<Arc<dyn UpstreamStrategy>> = Vec::new();
                let mut skipped = Vec::new();
                for entry in &model.upstreams {
                    if entry.requires_credential && !credential_present {
                        skipped.push(entry.name.clone());
                        continue;
                    }
                    upstreams.push(Arc::new(build_upstream(
                        entry,
                        client.clone(),
                        config.history_limit,
                        gemini_key.as_ref(),
                    )));
                }

                // Without the credential, an undeclared fallback means the default model.
                let fallback_model = match model.fallback_model {
                    Some(ref fallback) => Some(fallback.clone()),
                    None if !skipped.is_empty() && *name != config.default_model => {
                        Some(config.default_model.clone())
                    }
                    None => None,
                };

                if !skipped.is_empty() {
                    match fallback_model {
                        Some(ref fallback) => tracing::warn!(
                            model = %name,
                            skipped = ?skipped,
                            "No Gemini API key configured; skipping credentialed upstreams, '{fallback}' will serve the rest"
                        ),
                        None => tracing::warn!(
                            model = %name,
                            skipped = ?skipped,
                            "No Gemini API key configured; skipping credentialed upstreams"
                        ),
                    }
                }

                ModelRoute {
                    name: name.clone(),
                    upstreams,
                    fallback_model,
                    skipped,
                }
            })
            .collect();

        let mut registry = Self::new(config.default_model.clone(), routes)
            .with_aliases(config.model_aliases.clone());
        registry.credential_present = credential_present;
        registry
    }

    /// Map a requested model name to a registered one: aliases first, then
    /// exact names, otherwise the default model.
    pub fn resolve(&self, requested: Option<&str>) -> &str {
        let Some(requested) = requested else {
            return &self.default_model;
        };
        let key = requested.trim().to_lowercase();
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        match self.routes.get_key_value(&key) {
            Some((name, _)) => name,
            None => {
                tracing::debug!(
                    requested,
                    default = %self.default_model,
                    "Unknown model, using default"
                );
                &self.default_model
            }
        }
    }

    pub fn route(&self, model: &str) -> Option<&ModelRoute> {
        self.routes.get(model)
    }

    /// Routes to try for `model`: its own, then its fallback model's. The
    /// fallback hop is not followed transitively.
    pub fn chain(&self, model: &str) -> Vec<&ModelRoute> {
        let mut chain = Vec::new();
        if let Some(route) = self.routes.get(model) {
            chain.push(route);
            if let Some(fallback) = route.fallback_model.as_deref()
                && let Some(next) = self.routes.get(fallback)
            {
                chain.push(next);
            }
        }
        chain
    }

    pub fn routes(&self) -> impl Iterator<Item = &ModelRoute> {
        self.routes.values()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn credential_present(&self) -> bool {
        self.credential_present
    }
}

pub(crate) fn build_upstream(
    entry: &UpstreamConfig,
    client: reqwest::Client,
    history_limit: usize,
    gemini_key: Option<&String>,
) -> HttpUpstream {
    let api_key = if entry.requires_credential {
        gemini_key.cloned()
    } else {
        None
    };
    HttpUpstream::from_config(
        entry,
        client,
        default_paths(entry.shape),
        history_limit,
        api_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::tests::{Behavior, Scripted};

    fn sample() -> UpstreamRegistry {
        let chatgpt = ModelRoute::new(
            "chatgpt",
            vec![Scripted::new("a", Behavior::Reply("ok")) as Arc<dyn UpstreamStrategy>],
        );
        let gemini = ModelRoute::new("gemini", Vec::new()).with_fallback("chatgpt");
        UpstreamRegistry::new("chatgpt", vec![chatgpt, gemini])
            .with_aliases(HashMap::from([("gpt4".to_string(), "chatgpt".to_string())]))
    }

    #[test]
    fn test_resolve() {
        let registry = sample();
        assert_eq!(registry.resolve(None), "chatgpt");
        assert_eq!(registry.resolve(Some("GPT4")), "chatgpt");
        assert_eq!(registry.resolve(Some("gemini")), "gemini");
        assert_eq!(registry.resolve(Some("llama-9000")), "chatgpt");
    }

    #[test]
    fn test_chain_follows_one_fallback_hop() {
        let registry = sample();
        let names: Vec<&str> = registry
            .chain("gemini")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["gemini", "chatgpt"]);
        assert_eq!(registry.chain("chatgpt").len(), 1);
        assert!(registry.chain("missing").is_empty());
    }

    #[test]
    fn test_missing_credential_skips_gemini_upstream() {
        let config = Config::default();
        let client = reqwest::Client::new();

        let without = UpstreamRegistry::from_config(&config, client.clone(), None);
        assert!(!without.credential_present());
        let gemini = without.route("gemini").unwrap();
        assert!(gemini.upstreams.is_empty());
        assert_eq!(gemini.skipped, vec!["google-gemini"]);
        assert_eq!(gemini.fallback_model.as_deref(), Some("chatgpt"));

        let with = UpstreamRegistry::from_config(&config, client, Some("k".into()));
        assert!(with.credential_present());
        assert_eq!(with.route("gemini").unwrap().upstreams.len(), 1);
    }

    #[test]
    fn test_missing_credential_falls_back_to_default_model() {
        let yaml = r#"
default-model: claude
models:
  claude:
    upstreams:
      - url: "https://claude.example.com"
        shape: prompt
  gemini:
    upstreams:
      - url: "https://gemini.example.com"
        shape: gemini
        requires-credential: true
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let client = reqwest::Client::new();

        let without = UpstreamRegistry::from_config(&config, client.clone(), None);
        let names: Vec<&str> = without
            .chain("gemini")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["gemini", "claude"]);

        // With the key there is nothing to fall back from.
        let with = UpstreamRegistry::from_config(&config, client, Some("k".into()));
        assert!(with.route("gemini").unwrap().fallback_model.is_none());
        assert_eq!(with.chain("gemini").len(), 1);
    }

    #[test]
    fn test_model_names_sorted() {
        let registry = UpstreamRegistry::from_config(&Config::default(), reqwest::Client::new(), None);
        assert_eq!(registry.model_names(), vec!["chatgpt", "claude", "gemini"]);
    }
}
