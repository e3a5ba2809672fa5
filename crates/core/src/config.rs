use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

// ─── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub body_limit_mb: usize,

    // Logging
    pub logging_to_file: bool,
    pub log_dir: Option<String>,

    // Timeouts (seconds)
    pub connect_timeout: u64,
    /// Hard deadline for a single upstream attempt.
    pub request_timeout: u64,
    pub shutdown_timeout: u64,

    // Chat
    pub history_limit: usize,
    pub default_model: String,
    pub model_aliases: HashMap<String, String>,
    pub models: BTreeMap<String, ModelConfig>,

    // Image
    pub image: ImageConfig,

    /// Falls back to the `GEMINI_API_KEY` environment variable when unset.
    pub gemini_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8317,
            body_limit_mb: 2,
            logging_to_file: false,
            log_dir: None,
            connect_timeout: 10,
            request_timeout: 30,
            shutdown_timeout: 5,
            history_limit: 5,
            default_model: "chatgpt".to_string(),
            model_aliases: default_aliases(),
            models: default_models(),
            image: ImageConfig::default(),
            gemini_api_key: None,
        }
    }
}

impl Config {
    /// Load config from a YAML file, sanitize, and validate.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let mut config: Config = serde_yaml_ng::from_str(contents)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(self.request_timeout > 0, "request-timeout must be positive");
        anyhow::ensure!(self.connect_timeout > 0, "connect-timeout must be positive");
        anyhow::ensure!(
            self.models.contains_key(&self.default_model),
            "default-model '{}' is not defined under models",
            self.default_model
        );
        for (alias, target) in &self.model_aliases {
            anyhow::ensure!(
                self.models.contains_key(target),
                "model alias '{alias}' points to unknown model '{target}'"
            );
        }
        for (name, model) in &self.models {
            if let Some(ref fallback) = model.fallback_model {
                anyhow::ensure!(
                    self.models.contains_key(fallback),
                    "model '{name}' falls back to unknown model '{fallback}'"
                );
                anyhow::ensure!(fallback != name, "model '{name}' falls back to itself");
            }
            for upstream in &model.upstreams {
                validate_url(&upstream.url)
                    .map_err(|e| anyhow::anyhow!("model '{name}', upstream '{}': {e}", upstream.name))?;
            }
        }
        validate_url(&self.image.base_url).map_err(|e| anyhow::anyhow!("image base-url: {e}"))?;
        if let Some(ref fallback) = self.image.fallback {
            validate_url(&fallback.url)
                .map_err(|e| anyhow::anyhow!("image fallback '{}': {e}", fallback.name))?;
        }
        Ok(())
    }

    /// Sanitize and normalize configuration.
    fn sanitize(&mut self) {
        self.default_model = self.default_model.trim().to_lowercase();

        self.models = std::mem::take(&mut self.models)
            .into_iter()
            .map(|(name, mut model)| {
                model.fallback_model = model
                    .fallback_model
                    .map(|f| f.trim().to_lowercase())
                    .filter(|f| !f.is_empty());
                sanitize_upstreams(&mut model.upstreams);
                (name.trim().to_lowercase(), model)
            })
            .filter(|(_, model)| !model.upstreams.is_empty() || model.fallback_model.is_some())
            .collect();

        // Built-in aliases survive into custom registries; drop the ones
        // that point nowhere.
        let models = &self.models;
        self.model_aliases = std::mem::take(&mut self.model_aliases)
            .into_iter()
            .map(|(alias, target)| (alias.trim().to_lowercase(), target.trim().to_lowercase()))
            .filter(|(alias, target)| {
                let known = models.contains_key(target);
                if !known {
                    tracing::warn!(alias = %alias, target = %target, "Dropping model alias for unknown model");
                }
                known
            })
            .collect();

        self.image.base_url = self.image.base_url.trim().to_string();
        if !self.image.base_url.ends_with('/') {
            self.image.base_url.push('/');
        }
        if let Some(ref mut fallback) = self.image.fallback {
            fallback.url = fallback.url.trim().to_string();
        }
        self.gemini_api_key = self
            .gemini_api_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
    }

    /// The Gemini API key from config, else from the environment. Blank
    /// values count as absent.
    pub fn resolve_gemini_key(&self) -> Option<String> {
        self.gemini_api_key.clone().or_else(|| {
            std::env::var(GEMINI_API_KEY_ENV)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        })
    }
}

/// Drop entries without a URL and strip surrounding whitespace.
fn sanitize_upstreams(upstreams: &mut Vec<UpstreamConfig>) {
    for upstream in upstreams.iter_mut() {
        upstream.url = upstream.url.trim().to_string();
        upstream.name = upstream.name.trim().to_string();
        if upstream.name.is_empty() {
            upstream.name = upstream.url.clone();
        }
    }
    upstreams.retain(|u| !u.url.is_empty());
}

fn validate_url(raw: &str) -> Result<(), anyhow::Error> {
    let parsed = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid URL '{raw}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(anyhow::anyhow!(
            "unsupported scheme '{scheme}' in URL '{raw}', expected http/https"
        )),
    }
}

// ─── Upstreams ─────────────────────────────────────────────────────────────

/// How the JSON body sent to an upstream is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestShape {
    /// `{"query": ..., "history": [...]}`
    Query,
    /// `{"prompt": ...}`
    Prompt,
    /// `{"model": ..., "messages": [...]}`
    Messages,
    /// `{"contents": [{"role": ..., "parts": [{"text": ...}]}]}`
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModelConfig {
    /// Candidates in order of preference.
    pub upstreams: Vec<UpstreamConfig>,
    /// Model whose chain is tried once this one is exhausted.
    pub fallback_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpstreamConfig {
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub shape: RequestShape,
    /// Model name sent in the payload for `messages` upstreams.
    #[serde(default)]
    pub upstream_model: Option<String>,
    /// Overrides the shape's default response field paths.
    #[serde(default)]
    pub response_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub truncate_history: bool,
    /// Needs the Gemini API key; skipped when none is configured.
    #[serde(default)]
    pub requires_credential: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ImageConfig {
    /// Model name reported in image envelopes.
    pub model_name: String,
    /// Prefix the percent-encoded prompt is appended to.
    pub base_url: String,
    pub width: u32,
    pub height: u32,
    /// Extra query parameters appended after the dimensions.
    pub flags: BTreeMap<String, String>,
    /// Skip the direct URL and call the fallback upstream instead.
    pub prefer_upstream: bool,
    pub fallback: Option<UpstreamConfig>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model_name: "image".to_string(),
            base_url: "https://image.pollinations.ai/prompt/".to_string(),
            width: 1024,
            height: 1024,
            flags: BTreeMap::from([
                ("enhance".to_string(), "true".to_string()),
                ("nologo".to_string(), "true".to_string()),
            ]),
            prefer_upstream: false,
            fallback: None,
        }
    }
}

// ─── Built-in registry ─────────────────────────────────────────────────────

const POLLINATIONS_OPENAI_URL: &str = "https://text.pollinations.ai/openai";
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

fn messages_upstream(name: &str, upstream_model: &str) -> UpstreamConfig {
    UpstreamConfig {
        name: name.to_string(),
        url: POLLINATIONS_OPENAI_URL.to_string(),
        shape: RequestShape::Messages,
        upstream_model: Some(upstream_model.to_string()),
        response_paths: Vec::new(),
        truncate_history: true,
        requires_credential: false,
    }
}

fn default_models() -> BTreeMap<String, ModelConfig> {
    BTreeMap::from([
        (
            "chatgpt".to_string(),
            ModelConfig {
                upstreams: vec![
                    messages_upstream("pollinations-openai", "openai"),
                    messages_upstream("pollinations-openai-large", "openai-large"),
                ],
                fallback_model: None,
            },
        ),
        (
            "claude".to_string(),
            ModelConfig {
                upstreams: vec![messages_upstream("pollinations-claude", "claude")],
                fallback_model: None,
            },
        ),
        (
            "gemini".to_string(),
            ModelConfig {
                upstreams: vec![UpstreamConfig {
                    name: "google-gemini".to_string(),
                    url: GEMINI_GENERATE_URL.to_string(),
                    shape: RequestShape::Gemini,
                    upstream_model: None,
                    response_paths: Vec::new(),
                    truncate_history: true,
                    requires_credential: true,
                }],
                fallback_model: None,
            },
        ),
    ])
}

fn default_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("gpt4".to_string(), "chatgpt".to_string()),
        ("gpt-4".to_string(), "chatgpt".to_string()),
        ("gpt".to_string(), "chatgpt".to_string()),
    ])
}
