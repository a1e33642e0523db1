//! LLM access for the coherence rating signal.
//!
//! - [`CompletionModel`] - One-shot text completion, the seam judges depend on
//! - [`ChatClient`] - OpenAI-compatible `/chat/completions` client (Gemini by default)
//! - [`RetryPolicy`] - Bounded exponential backoff for rate-limited calls
//! - [`CoherenceRater`] - Asks the model for a 1-5 coherence rating
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tribunal_config::Settings;
//! use tribunal_llm::{ChatClient, CoherenceRater};
//!
//! let settings = Settings::load()?;
//! if let Some(client) = ChatClient::from_settings(&settings.rating) {
//!     let rater = CoherenceRater::new(Arc::new(client), (&settings.rating).into());
//!     let rating = rater.rate("The sky is blue. It is clear today.").await;
//! }
//! ```

mod client;
mod rater;
mod retry;

pub use client::ChatClient;
pub use rater::{parse_rating, CoherenceRater, COHERENCE_RATING_PROMPT};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use thiserror::Error;
use tribunal_core::JudgeError;

/// Errors from LLM calls.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 or a provider rate-limit message.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether the call may succeed if repeated after a delay.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

impl From<LlmError> for JudgeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited(msg) => JudgeError::RateLimited(msg),
            LlmError::InvalidResponse(msg) => JudgeError::ParseError(msg),
            other => JudgeError::TransientApi(other.to_string()),
        }
    }
}

/// A model that completes a single user prompt.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
