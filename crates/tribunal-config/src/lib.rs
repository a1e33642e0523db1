//! Settings schema and loading for tribunal.
//!
//! This crate defines everything the judges need from the outside world:
//!
//! - [`Settings`] - Complete runtime configuration
//! - [`ModelSettings`] - Hosted model identifiers for each judge
//! - [`InferenceSettings`] - Hosted-inference endpoints and token
//! - [`RatingSettings`] - External coherence-rating model and retry policy
//! - [`SearchSettings`] - Web search provider
//! - [`SignalWeights`] - Coherence blend weights
//! - [`ServerSettings`] - HTTP bind address and body limit
//!
//! # Loading
//!
//! Settings start from defaults, optionally overlaid by a JSON file named in
//! `TRIBUNAL_CONFIG`, then by individual environment variables
//! (`HF_TOKEN`, `GEMINI_API_KEY`, `TAVILY_API_KEY`, ...).
//!
//! ```rust,ignore
//! use tribunal_config::Settings;
//!
//! let settings = Settings::load()?;
//! assert!(settings.weights.total() > 0.0);
//! ```
//!
//! # From JSON
//!
//! ```rust
//! use tribunal_config::Settings;
//!
//! let settings = Settings::from_json(r#"{ "search": { "max_results": 3 } }"#).unwrap();
//! assert_eq!(settings.search.max_results, 3);
//! assert_eq!(settings.inference.max_length, 512);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Placeholder shipped in sample `.env` files; treated as "no key".
const PLACEHOLDER_RATING_KEY: &str = "YOUR_GEMINI_API_KEY";

/// Errors that can occur when loading or validating settings.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read a settings file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON settings.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A setting holds an unusable value.
    #[error("Invalid setting '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    /// Creates an I/O error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Creates a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }
}

/// Hosted model identifiers, one per judge backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Fine-tuned instruction-following classifier (single-logit head).
    pub instruction: String,
    /// Natural-language-inference classifier.
    pub nli: String,
    /// Relevance cross-encoder used to rank evidence snippets.
    pub cross_encoder: String,
    /// Sentence embedding model for similarity signals.
    pub embedding: String,
    /// Small causal LM used for perplexity, served by text-generation-inference.
    pub language_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            instruction: "aditya1310/instruction-judge".into(),
            nli: "MoritzLaurer/DeBERTa-v3-base-mnli".into(),
            cross_encoder: "cross-encoder/ms-marco-MiniLM-L-6-v2".into(),
            embedding: "sentence-transformers/all-MiniLM-L6-v2".into(),
            language_model: "distilgpt2".into(),
        }
    }
}

/// Hosted-inference provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Base URL for model inference; the model id is appended.
    pub api_base: String,
    /// Base URL for model metadata, used by the startup probe.
    pub hub_api_base: String,
    /// Bearer token for the provider (`HF_TOKEN`).
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Text-generation-inference endpoint serving the perplexity LM (`TGI_URL`).
    pub tgi_url: Option<String>,
    /// Token budget for classifier inputs.
    pub max_length: usize,
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_base: "https://router.huggingface.co/hf-inference/models".into(),
            hub_api_base: "https://huggingface.co/api/models".into(),
            token: None,
            tgi_url: None,
            max_length: 512,
            timeout_secs: 60,
        }
    }
}

impl InferenceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External coherence-rating model (OpenAI-compatible chat endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    /// API key (`GEMINI_API_KEY`). Absent or placeholder disables the signal.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            max_attempts: 3,
            backoff_base_ms: 1000,
            timeout_secs: 60,
        }
    }
}

impl RatingSettings {
    /// Returns the API key when it is set to something other than the placeholder.
    pub fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains(PLACEHOLDER_RATING_KEY))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// Web search provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Tavily API key (`TAVILY_API_KEY`). Absent disables retrieval.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: String,
    /// Maximum snippets retrieved per claim.
    pub max_results: usize,
    /// Tavily search depth: `basic` or `advanced`.
    pub search_depth: String,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.tavily.com".into(),
            max_results: 5,
            search_depth: "basic".into(),
            timeout_secs: 30,
        }
    }
}

/// Relative weights of the four coherence signals.
///
/// Weights of unavailable signals are dropped and the rest renormalized, so
/// only their ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub llm: f64,
    pub prompt_sim: f64,
    pub perplexity: f64,
    pub adj_sim: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self { llm: 0.4, prompt_sim: 0.3, perplexity: 0.2, adj_sim: 0.1 }
    }
}

impl SignalWeights {
    pub fn total(&self) -> f64 {
        self.llm + self.prompt_sim + self.perplexity + self.adj_sim
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("weights.llm", self.llm),
            ("weights.prompt_sim", self.prompt_sim),
            ("weights.perplexity", self.perplexity),
            ("weights.adj_sim", self.adj_sim),
        ];
        for (field, w) in named {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::validation(field, format!("must be a non-negative number, got {}", w)));
            }
        }
        if self.total() <= 0.0 {
            return Err(ConfigError::validation("weights", "at least one weight must be positive"));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
    pub max_body_bytes: usize,
    /// Allowed CORS origin (`CLIENT_URI`); any origin when unset.
    pub client_uri: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".into(),
            max_body_bytes: 16 * 1024 * 1024,
            client_uri: None,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models: ModelSettings,
    pub inference: InferenceSettings,
    pub rating: RatingSettings,
    pub search: SearchSettings,
    pub weights: SignalWeights,
    pub server: ServerSettings,
}

impl Settings {
    /// Loads settings from `TRIBUNAL_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("TRIBUNAL_CONFIG") {
            Ok(path) => {
                info!("Loading settings from {}", path);
                Self::from_file(&path)?
            }
            Err(_) => Self::default(),
        };
        let settings = base.with_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file, without environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses settings from a JSON string; missing sections take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlays values found through `lookup` (normally the process environment).
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("HF_TOKEN") {
            self.inference.token = Some(token);
        }
        if let Some(url) = lookup("TGI_URL") {
            self.inference.tgi_url = Some(url);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.rating.api_key = Some(key);
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(addr) = lookup("TRIBUNAL_ADDR") {
            self.server.addr = addr;
        }
        if let Some(origin) = lookup("CLIENT_URI") {
            self.server.client_uri = Some(origin);
        }

        debug!(
            hf_token = self.inference.token.is_some(),
            rating_key = self.rating.usable_key().is_some(),
            search_key = self.search.api_key.is_some(),
            "Applied environment overrides"
        );
        self
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if self.rating.max_attempts == 0 {
            return Err(ConfigError::validation("rating.max_attempts", "must be at least 1"));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::validation("search.max_results", "must be at least 1"));
        }
        if self.inference.max_length == 0 {
            return Err(ConfigError::validation("inference.max_length", "must be at least 1"));
        }
        Ok(())
    }
}
