//! Hosted-model backends for the tribunal judges.
//!
//! Every model the judges use is served remotely; this crate wraps the
//! provider APIs behind small traits so judges can be tested with fakes:
//!
//! - [`SequenceClassifier`] - Single-text or text-pair classification
//!   ([`HfClassifier`]: instruction judge, NLI, cross-encoder)
//! - [`Embedder`] - Sentence embeddings ([`HfEmbedder`])
//! - [`PerplexityModel`] - Causal-LM perplexity ([`TgiPerplexity`])
//!
//! Each backend has an async `connect` constructor that probes the provider
//! once. A failed probe is the "model failed to load" condition: callers keep
//! `None` for that capability and the judge degrades to its sentinel.
//!
//! # Example
//!
//! ```rust,ignore
//! use tribunal_config::Settings;
//! use tribunal_inference::{Activation, ClassifierInput, HfClassifier, SequenceClassifier};
//!
//! let settings = Settings::load()?;
//! let nli = HfClassifier::connect(&settings.inference, &settings.models.nli, Activation::Softmax).await?;
//! let scores = nli.classify(ClassifierInput::Pair { text: evidence, text_pair: claim }).await?;
//! ```

mod classifier;
mod client;
mod embedding;
mod perplexity;

pub use classifier::{top_label, Activation, HfClassifier};
pub use embedding::{mean_pool, HfEmbedder};
pub use perplexity::{perplexity_from_logprobs, TgiPerplexity};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tribunal_core::JudgeError;

/// Errors returned by hosted-model backends.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Network request failed.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("Inference API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Provider answered with a body we could not interpret.
    #[error("Unexpected inference response: {0}")]
    InvalidResponse(String),
}

impl From<InferenceError> for JudgeError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::InvalidResponse(msg) => JudgeError::ParseError(msg),
            other => JudgeError::TransientApi(other.to_string()),
        }
    }
}

/// One label and its score from a classification head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Input to a sequence classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifierInput<'a> {
    /// A single text.
    Text(&'a str),
    /// A text pair, e.g. (premise, hypothesis) or (query, passage).
    Pair { text: &'a str, text_pair: &'a str },
}

/// A sequence classification model.
#[async_trait]
pub trait SequenceClassifier: Send + Sync {
    /// Identifier of the backing model, for logs.
    fn model_id(&self) -> &str;

    /// Classifies the input, returning every label the model reports.
    async fn classify(&self, input: ClassifierInput<'_>) -> Result<Vec<LabelScore>, InferenceError>;
}

/// A sentence embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text; the output has one vector per input, in order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, InferenceError>;
}

/// A causal language model able to score text.
#[async_trait]
pub trait PerplexityModel: Send + Sync {
    /// Perplexity of `text` under the model.
    async fn perplexity(&self, text: &str) -> Result<f64, InferenceError>;
}
