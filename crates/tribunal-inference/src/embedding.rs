//! Sentence embeddings via the hosted feature-extraction pipeline.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use tribunal_config::InferenceSettings;

use crate::client::{join_url, HostedClient};
use crate::{Embedder, InferenceError};

/// Sentence-transformers models reply with one pooled vector per input;
/// plain encoders reply with one vector per token.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureReply {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

/// Embedding model served by the hosted-inference API.
pub struct HfEmbedder {
    http: HostedClient,
    model_id: String,
    url: String,
}

impl HfEmbedder {
    pub fn new(settings: &InferenceSettings, model_id: &str) -> Self {
        Self {
            http: HostedClient::new(settings),
            model_id: model_id.to_string(),
            url: join_url(&settings.api_base, &format!("{}/pipeline/feature-extraction", model_id)),
        }
    }

    /// Creates an embedder after confirming the model exists on the hub.
    pub async fn connect(settings: &InferenceSettings, model_id: &str) -> Result<Self, InferenceError> {
        let embedder = Self::new(settings, model_id);
        embedder.http.probe(&join_url(&settings.hub_api_base, model_id)).await?;
        Ok(embedder)
    }
}

#[async_trait]
impl Embedder for HfEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, InferenceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({ "inputs": texts });
        let reply: FeatureReply = self.http.post_json(&self.url, &body).await?;
        let vectors = match reply {
            FeatureReply::Pooled(vectors) => vectors,
            FeatureReply::Tokens(per_text) => per_text.iter().map(|tokens| mean_pool(tokens)).collect(),
        };

        if vectors.len() != texts.len() {
            return Err(InferenceError::InvalidResponse(format!(
                "{}: expected {} embeddings, got {}",
                self.model_id,
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

/// Averages token vectors into one sentence vector.
pub fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.len()];
    for token in tokens {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let n = tokens.len() as f32;
    sum.iter_mut().for_each(|v| *v /= n);
    sum
}
