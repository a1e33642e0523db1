//! Perplexity from a text-generation-inference (TGI) server.
//!
//! TGI returns per-token log-probabilities of the prompt ("prefill") when
//! `decoder_input_details` is set; perplexity is `exp(-mean(logprob))` over
//! every token after the first. A single-token input has nothing to score and
//! yields NaN, which callers treat as maximally surprising.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use tribunal_config::InferenceSettings;

use crate::client::{join_url, HostedClient};
use crate::{InferenceError, PerplexityModel};

#[derive(Deserialize)]
struct GenerateReply {
    details: Option<GenerateDetails>,
}

#[derive(Deserialize)]
struct GenerateDetails {
    #[serde(default)]
    prefill: Vec<PrefillToken>,
}

#[derive(Deserialize)]
struct PrefillToken {
    logprob: Option<f64>,
}

#[derive(Deserialize)]
struct InfoReply {
    model_id: String,
}

/// Causal LM served by TGI.
pub struct TgiPerplexity {
    http: HostedClient,
    url: String,
}

impl TgiPerplexity {
    pub fn new(settings: &InferenceSettings, tgi_url: &str) -> Self {
        Self {
            http: HostedClient::new(settings),
            url: join_url(tgi_url, "generate"),
        }
    }

    /// Connects to the server and checks which model it serves.
    ///
    /// A model other than `expected_model` is logged but accepted.
    pub async fn connect(
        settings: &InferenceSettings,
        tgi_url: &str,
        expected_model: &str,
    ) -> Result<Self, InferenceError> {
        let lm = Self::new(settings, tgi_url);
        let info_url = join_url(tgi_url, "info");
        let info: InfoReply = lm.http.get_json(&info_url).await?;
        if info.model_id != expected_model {
            warn!("TGI at {} serves '{}', expected '{}'", tgi_url, info.model_id, expected_model);
        }
        Ok(lm)
    }
}

#[async_trait]
impl PerplexityModel for TgiPerplexity {
    async fn perplexity(&self, text: &str) -> Result<f64, InferenceError> {
        let body = json!({
            "inputs": text,
            "parameters": {
                "max_new_tokens": 1,
                "details": true,
                "decoder_input_details": true,
            }
        });
        let reply: GenerateReply = self.http.post_json(&self.url, &body).await?;
        let details = reply
            .details
            .ok_or_else(|| InferenceError::InvalidResponse("TGI reply has no details".into()))?;
        let logprobs: Vec<f64> = details.prefill.into_iter().filter_map(|t| t.logprob).collect();

        let ppl = perplexity_from_logprobs(&logprobs);
        debug!("Perplexity {:.2} over {} tokens", ppl, logprobs.len());
        Ok(ppl)
    }
}

/// Perplexity from token log-probabilities; NaN when there are none.
pub fn perplexity_from_logprobs(logprobs: &[f64]) -> f64 {
    if logprobs.is_empty() {
        return f64::NAN;
    }
    let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
    (-mean).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perplexity_of_certain_tokens_is_one() {
        assert_eq!(perplexity_from_logprobs(&[0.0, 0.0]), 1.0);
        assert!(perplexity_from_logprobs(&[]).is_nan());

        let ppl = perplexity_from_logprobs(&[(0.5f64).ln(), (0.5f64).ln()]);
        assert!((ppl - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn skips_first_token_without_logprob() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .match_body(mockito::Matcher::PartialJson(json!({
                "parameters": { "decoder_input_details": true }
            })))
            .with_status(200)
            .with_body(
                r#"{"generated_text":" the","details":{"prefill":[
                    {"id":1,"text":"Hello","logprob":null},
                    {"id":2,"text":" world","logprob":-0.6931471805599453}
                ]}}"#,
            )
            .create_async()
            .await;

        let lm = TgiPerplexity::new(&InferenceSettings::default(), &server.url());
        let ppl = lm.perplexity("Hello world").await.unwrap();
        assert!((ppl - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn single_token_input_has_nan_perplexity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"generated_text":"x","details":{"prefill":[{"id":1,"text":"Hi","logprob":null}]}}"#)
            .create_async()
            .await;

        let lm = TgiPerplexity::new(&InferenceSettings::default(), &server.url());
        assert!(lm.perplexity("Hi").await.unwrap().is_nan());
    }

    #[tokio::test]
    async fn reply_without_details_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"generated_text":"x"}"#)
            .create_async()
            .await;

        let lm = TgiPerplexity::new(&InferenceSettings::default(), &server.url());
        assert!(matches!(lm.perplexity("Hi").await, Err(InferenceError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn connect_reads_served_model() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/info")
            .with_status(200)
            .with_body(r#"{"model_id":"gpt2","max_input_tokens":1024}"#)
            .create_async()
            .await;

        assert!(TgiPerplexity::connect(&InferenceSettings::default(), &server.url(), "distilgpt2").await.is_ok());
    }
}
