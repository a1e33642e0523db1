//! Web evidence retrieval.
//!
//! - [`SearchProvider`] - Trait for anything that turns a query into snippets
//! - [`TavilySearch`] - Tavily search API (requires `TAVILY_API_KEY`)
//!
//! # Example
//!
//! ```rust,ignore
//! use tribunal_search::{SearchProvider, TavilySearch};
//!
//! if let Some(search) = TavilySearch::from_settings(&settings.search) {
//!     let snippets = search.search("The Eiffel Tower is in Paris.", 5).await?;
//! }
//! ```

mod tavily;

pub use tavily::TavilySearch;

use async_trait::async_trait;
use thiserror::Error;
use tribunal_core::JudgeError;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse search response: {0}")]
    InvalidResponse(String),
}

impl From<SearchError> for JudgeError {
    fn from(err: SearchError) -> Self {
        JudgeError::RetrievalFailure(err.to_string())
    }
}

/// A web search backend returning text snippets.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `max_results` non-empty snippets, best first.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError>;
}
