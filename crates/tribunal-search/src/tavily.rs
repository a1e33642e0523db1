use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tribunal_config::SearchSettings;

use crate::{SearchError, SearchProvider};

/// Web search using the Tavily API.
pub struct TavilySearch {
    api_key: String,
    api_base: String,
    search_depth: String,
    client: reqwest::Client,
}

impl TavilySearch {
    /// `None` when no API key is configured.
    pub fn from_settings(settings: &SearchSettings) -> Option<Self> {
        let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty())?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Some(Self {
            api_key,
            api_base: settings.api_base.clone(),
            search_depth: settings.search_depth.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: &self.search_depth,
        };

        let response = self
            .client
            .post(format!("{}/search", self.api_base.trim_end_matches('/')))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status: status.as_u16(), message });
        }

        let tavily_response: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let snippets: Vec<String> = tavily_response
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .inspect(|r| debug!("Evidence from {}", r.url))
            .map(|r| r.content)
            .take(max_results)
            .collect();

        debug!("Tavily returned {} snippets for {:?}", snippets.len(), query);
        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn provider(base: &str) -> TavilySearch {
        let settings = SearchSettings {
            api_key: Some("tvly-test".into()),
            api_base: base.to_string(),
            ..SearchSettings::default()
        };
        TavilySearch::from_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn returns_non_empty_snippets_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({
                "api_key": "tvly-test",
                "query": "Paris is in France",
                "max_results": 2,
                "search_depth": "basic"
            })))
            .with_status(200)
            .with_body(
                r#"{"results":[
                    {"title":"a","url":"https://a","content":"Paris is the capital of France.","score":0.9},
                    {"title":"b","url":"https://b","content":"   ","score":0.8},
                    {"title":"c","url":"https://c","content":"France borders Spain.","score":0.7}
                ]}"#,
            )
            .create_async()
            .await;

        let snippets = provider(&server.url()).search("Paris is in France", 2).await.unwrap();
        assert_eq!(snippets, vec!["Paris is the capital of France.", "France borders Spain."]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors_surface() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/search").with_status(401).with_body("bad key").create_async().await;

        let err = provider(&server.url()).search("x", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Api { status: 401, .. }));
    }

    #[test]
    fn requires_api_key() {
        assert!(TavilySearch::from_settings(&SearchSettings::default()).is_none());
    }
}
