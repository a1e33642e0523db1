//! Text-classification backend on the hosted-inference API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use tribunal_config::InferenceSettings;

use crate::client::{join_url, HostedClient};
use crate::{ClassifierInput, InferenceError, LabelScore, SequenceClassifier};

/// Post-processing applied to the classification head's logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Raw logits; used for single-logit regression heads and cross-encoders.
    None,
    /// Softmax over labels; used for NLI.
    Softmax,
}

impl Activation {
    fn as_param(&self) -> &'static str {
        match self {
            Activation::None => "none",
            Activation::Softmax => "softmax",
        }
    }
}

/// The API answers `[[{label, score}]]` for one input, some deployments `[{label, score}]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassificationReply {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationReply {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            ClassificationReply::Nested(mut outer) if !outer.is_empty() => outer.swap_remove(0),
            ClassificationReply::Nested(_) => Vec::new(),
            ClassificationReply::Flat(scores) => scores,
        }
    }
}

/// Sequence classifier served by the hosted-inference API.
pub struct HfClassifier {
    http: HostedClient,
    model_id: String,
    url: String,
    activation: Activation,
    max_length: usize,
}

impl HfClassifier {
    /// Creates a classifier without contacting the provider.
    pub fn new(settings: &InferenceSettings, model_id: &str, activation: Activation) -> Self {
        Self {
            http: HostedClient::new(settings),
            model_id: model_id.to_string(),
            url: join_url(&settings.api_base, model_id),
            activation,
            max_length: settings.max_length,
        }
    }

    /// Creates a classifier after confirming the model exists on the hub.
    pub async fn connect(
        settings: &InferenceSettings,
        model_id: &str,
        activation: Activation,
    ) -> Result<Self, InferenceError> {
        let classifier = Self::new(settings, model_id, activation);
        classifier.http.probe(&join_url(&settings.hub_api_base, model_id)).await?;
        Ok(classifier)
    }

    fn request_body(&self, input: ClassifierInput<'_>) -> Value {
        let inputs = match input {
            ClassifierInput::Text(text) => json!(text),
            ClassifierInput::Pair { text, text_pair } => json!({ "text": text, "text_pair": text_pair }),
        };
        json!({
            "inputs": inputs,
            "parameters": {
                "function_to_apply": self.activation.as_param(),
                "truncation": true,
                "max_length": self.max_length,
            }
        })
    }
}

#[async_trait]
impl SequenceClassifier for HfClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn classify(&self, input: ClassifierInput<'_>) -> Result<Vec<LabelScore>, InferenceError> {
        let body = self.request_body(input);
        let reply: ClassificationReply = self.http.post_json(&self.url, &body).await?;
        let scores = reply.into_scores();
        if scores.is_empty() {
            return Err(InferenceError::InvalidResponse(format!("{} returned no labels", self.model_id)));
        }
        debug!("{}: {} labels", self.model_id, scores.len());
        Ok(scores)
    }
}

/// Returns the highest-scoring label; the first one wins a tie.
pub fn top_label(scores: &[LabelScore]) -> Option<&LabelScore> {
    scores.iter().fold(None, |best: Option<&LabelScore>, candidate| match best {
        Some(b) if b.score >= candidate.score => Some(b),
        _ => Some(candidate),
    })
}
