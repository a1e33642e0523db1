//! Coherence judge (J3): a weighted blend of up to four signals.
//!
//! | Signal | Source | Normalization |
//! |--------|--------|---------------|
//! | `llm` | External model rating 1-5 | `(r - 1) / 4` |
//! | `prompt_sim` | Cosine of prompt and response embeddings | clamp to [0, 1] |
//! | `perplexity` | Causal LM perplexity of the response | `1 - min(ppl, 1000) / 1000` |
//! | `adj_sim` | Mean cosine of consecutive sentences | clamp to [0, 1] |
//!
//! Signals that cannot be computed drop out and the remaining weights are
//! renormalized. The blend maps to `1 + 4 * sum`, within [1, 5].

use std::sync::Arc;

use tracing::{debug, warn};

use tribunal_config::SignalWeights;
use tribunal_core::{COHERENCE_MAX, COHERENCE_MIN};
use tribunal_inference::{Embedder, PerplexityModel};
use tribunal_llm::CoherenceRater;

use crate::similarity::{cosine_similarity, mean_adjacent_similarity, split_sentences};

/// Perplexity assigned to empty text or when the model reports a non-finite value.
pub const PERPLEXITY_SENTINEL: f64 = 10_000.0;
/// Perplexity at or above which the fluency signal is zero.
pub const PERPLEXITY_CEILING: f64 = 1_000.0;
/// Adjacent-sentence similarity used when there are fewer than two sentences.
pub const NEUTRAL_ADJACENT_SIMILARITY: f64 = 0.5;
/// Score returned when no signal is available.
pub const NEUTRAL_COHERENCE: f64 = 3.0;

/// The signals blended into a coherence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Llm,
    PromptSim,
    Perplexity,
    AdjSim,
}

impl Signal {
    pub const ALL: [Signal; 4] = [Signal::Llm, Signal::PromptSim, Signal::Perplexity, Signal::AdjSim];

    pub fn weight(&self, weights: &SignalWeights) -> f64 {
        match self {
            Signal::Llm => weights.llm,
            Signal::PromptSim => weights.prompt_sim,
            Signal::Perplexity => weights.perplexity,
            Signal::AdjSim => weights.adj_sim,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Llm => "llm",
            Signal::PromptSim => "prompt_sim",
            Signal::Perplexity => "perplexity",
            Signal::AdjSim => "adj_sim",
        }
    }
}

/// Signal values for one response; `None` marks an unavailable signal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalValues {
    pub llm: Option<f64>,
    pub prompt_sim: Option<f64>,
    pub perplexity: Option<f64>,
    pub adj_sim: Option<f64>,
}

impl SignalValues {
    pub fn get(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::Llm => self.llm,
            Signal::PromptSim => self.prompt_sim,
            Signal::Perplexity => self.perplexity,
            Signal::AdjSim => self.adj_sim,
        }
    }
}

/// Maps a 1-5 rating onto [0, 1].
pub fn normalize_rating(rating: f64) -> f64 {
    ((rating - 1.0) / 4.0).clamp(0.0, 1.0)
}

/// Maps perplexity onto [0, 1]; lower perplexity scores higher.
pub fn normalize_perplexity(perplexity: f64) -> f64 {
    let ppl = if perplexity.is_finite() { perplexity } else { PERPLEXITY_SENTINEL };
    (1.0 - ppl.clamp(0.0, PERPLEXITY_CEILING) / PERPLEXITY_CEILING).max(0.0)
}

/// Blends the available signals into a score in [1, 5].
///
/// Unavailable signals and signals with zero weight are dropped before the
/// remaining weights are renormalized to sum to one.
pub fn blend(weights: &SignalWeights, values: &SignalValues) -> f64 {
    let active: Vec<(Signal, f64, f64)> = Signal::ALL
        .iter()
        .filter_map(|&s| {
            let value = values.get(s).filter(|v| v.is_finite())?;
            let weight = s.weight(weights);
            (weight > 0.0).then_some((s, weight, value.clamp(0.0, 1.0)))
        })
        .collect();

    let total: f64 = active.iter().map(|(_, w, _)| w).sum();
    if active.is_empty() || total <= 0.0 {
        return NEUTRAL_COHERENCE;
    }

    let weighted: f64 = active.iter().map(|(_, w, v)| (w / total) * v).sum();
    for (s, w, v) in &active {
        debug!("signal {} = {:.4} (weight {:.3})", s.name(), v, w / total);
    }
    (1.0 + 4.0 * weighted).clamp(COHERENCE_MIN, COHERENCE_MAX)
}

pub struct CoherenceJudge {
    rater: Option<Arc<CoherenceRater>>,
    embedder: Option<Arc<dyn Embedder>>,
    language_model: Option<Arc<dyn PerplexityModel>>,
    weights: SignalWeights,
}

impl CoherenceJudge {
    pub fn new(
        rater: Option<Arc<CoherenceRater>>,
        embedder: Option<Arc<dyn Embedder>>,
        language_model: Option<Arc<dyn PerplexityModel>>,
        weights: SignalWeights,
    ) -> Self {
        Self { rater, embedder, language_model, weights }
    }

    /// Scores the response's coherence in [1, 5].
    pub async fn score(&self, prompt: &str, response: &str) -> f64 {
        let values = self.signals(prompt, response).await;
        blend(&self.weights, &values)
    }

    /// Computes every signal concurrently.
    pub async fn signals(&self, prompt: &str, response: &str) -> SignalValues {
        let (llm, prompt_sim, perplexity, adj_sim) = tokio::join!(
            self.llm_signal(response),
            self.prompt_similarity(prompt, response),
            self.perplexity_signal(response),
            self.adjacent_similarity(response),
        );
        SignalValues { llm, prompt_sim, perplexity, adj_sim }
    }

    async fn llm_signal(&self, response: &str) -> Option<f64> {
        let rater = self.rater.as_ref()?;
        rater.rate(response).await.map(normalize_rating)
    }

    async fn prompt_similarity(&self, prompt: &str, response: &str) -> Option<f64> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(&[prompt, response]).await {
            Ok(vectors) if vectors.len() == 2 => {
                // Zero vectors have no direction; treat them as unrelated.
                Some(cosine_similarity(&vectors[0], &vectors[1]).unwrap_or(0.0).clamp(0.0, 1.0))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Prompt similarity unavailable: {}", e);
                None
            }
        }
    }

    async fn adjacent_similarity(&self, response: &str) -> Option<f64> {
        let embedder = self.embedder.as_ref()?;
        let sentences = split_sentences(response);
        if sentences.len() < 2 {
            return Some(NEUTRAL_ADJACENT_SIMILARITY);
        }
        match embedder.embed(&sentences).await {
            Ok(vectors) => Some(
                mean_adjacent_similarity(&vectors)
                    .unwrap_or(NEUTRAL_ADJACENT_SIMILARITY)
                    .clamp(0.0, 1.0),
            ),
            Err(e) => {
                warn!("Adjacent-sentence similarity unavailable: {}", e);
                None
            }
        }
    }

    async fn perplexity_signal(&self, response: &str) -> Option<f64> {
        let lm = self.language_model.as_ref()?;
        if response.trim().is_empty() {
            return Some(normalize_perplexity(PERPLEXITY_SENTINEL));
        }
        match lm.perplexity(response).await {
            Ok(ppl) if !ppl.is_finite() => {
                debug!("Perplexity undefined for response, using sentinel");
                Some(normalize_perplexity(PERPLEXITY_SENTINEL))
            }
            Ok(ppl) => Some(normalize_perplexity(ppl)),
            Err(e) => {
                warn!("Perplexity unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCompletion, FakeEmbedder, FakePerplexity};
    use tribunal_config::InferenceSettings;
    use tribunal_inference::TgiPerplexity;
    use tribunal_llm::RetryPolicy;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn all(v: f64) -> SignalValues {
        SignalValues { llm: Some(v), prompt_sim: Some(v), perplexity: Some(v), adj_sim: Some(v) }
    }

    fn rater(reply: &str) -> Option<Arc<CoherenceRater>> {
        Some(Arc::new(CoherenceRater::new(FakeCompletion::replying(reply), RetryPolicy::default())))
    }

    #[test]
    fn perplexity_normalization_points() {
        assert_eq!(normalize_perplexity(0.0), 1.0);
        assert_eq!(normalize_perplexity(1000.0), 0.0);
        assert_eq!(normalize_perplexity(5000.0), 0.0);
        assert_eq!(normalize_perplexity(PERPLEXITY_SENTINEL), 0.0);
        assert_eq!(normalize_perplexity(f64::NAN), 0.0);
        assert!(approx(normalize_perplexity(250.0), 0.75));
    }

    #[test]
    fn rating_normalization() {
        assert_eq!(normalize_rating(1.0), 0.0);
        assert_eq!(normalize_rating(5.0), 1.0);
        assert_eq!(normalize_rating(3.0), 0.5);
    }

    #[test]
    fn blend_extremes() {
        let w = SignalWeights::default();
        assert!(approx(blend(&w, &all(1.0)), 5.0));
        assert!(approx(blend(&w, &all(0.0)), 1.0));
        assert_eq!(blend(&w, &SignalValues::default()), NEUTRAL_COHERENCE);
    }

    #[test]
    fn missing_llm_renormalizes_remaining_weights() {
        let w = SignalWeights::default();
        let values = SignalValues { llm: None, prompt_sim: Some(1.0), perplexity: Some(0.0), adj_sim: Some(0.0) };
        // prompt_sim carries 0.3 / 0.6 of the remaining weight.
        assert!(approx(blend(&w, &values), 1.0 + 4.0 * 0.5));

        let zeroed = SignalWeights { llm: 0.0, ..w };
        let with_llm = SignalValues { llm: Some(1.0), ..values };
        assert!(approx(blend(&zeroed, &with_llm), blend(&w, &values)));
    }

    #[test]
    fn blend_stays_in_range_for_out_of_range_inputs() {
        let w = SignalWeights::default();
        let wild = SignalValues { llm: Some(7.0), prompt_sim: Some(-3.0), perplexity: Some(f64::INFINITY), adj_sim: None };
        let score = blend(&w, &wild);
        assert!((COHERENCE_MIN..=COHERENCE_MAX).contains(&score));
    }

    #[tokio::test]
    async fn no_backends_yields_neutral_midpoint() {
        let judge = CoherenceJudge::new(None, None, None, SignalWeights::default());
        assert_eq!(judge.score("p", "r").await, NEUTRAL_COHERENCE);
    }

    #[tokio::test]
    async fn single_sentence_uses_neutral_adjacency() {
        let embedder = FakeEmbedder::constant(vec![1.0, 0.0]);
        let judge = CoherenceJudge::new(None, Some(embedder.clone()), None, SignalWeights::default());

        let values = judge.signals("What is 2+2?", "4").await;
        assert_eq!(values.adj_sim, Some(NEUTRAL_ADJACENT_SIMILARITY));
        assert_eq!(values.prompt_sim, Some(1.0));
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn empty_response_gets_sentinel_perplexity() {
        let lm = FakePerplexity::fixed(12.0);
        let judge = CoherenceJudge::new(None, None, Some(lm.clone()), SignalWeights::default());

        let values = judge.signals("p", "   ").await;
        assert_eq!(values.perplexity, Some(0.0));
        assert_eq!(lm.calls(), 0);
    }

    #[tokio::test]
    async fn single_token_response_gets_sentinel_perplexity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"generated_text":"\n","details":{"prefill":[{"id":19,"text":"4","logprob":null}]}}"#)
            .create_async()
            .await;

        let lm = Arc::new(TgiPerplexity::new(&InferenceSettings::default(), &server.url()));
        let judge = CoherenceJudge::new(None, None, Some(lm), SignalWeights::default());

        let values = judge.signals("What is 2+2?", "4").await;
        assert_eq!(values.perplexity, Some(0.0));
        assert_eq!(judge.score("What is 2+2?", "4").await, COHERENCE_MIN);
    }

    #[tokio::test]
    async fn all_signals_blend() {
        let judge = CoherenceJudge::new(
            rater("5"),
            Some(FakeEmbedder::constant(vec![0.0, 1.0])),
            Some(FakePerplexity::fixed(0.0)),
            SignalWeights::default(),
        );
        let values = judge.signals("Tell me two facts.", "Water is wet. Fire is hot.").await;
        assert_eq!(values, all(1.0));
        assert!(approx(judge.score("Tell me two facts.", "Water is wet. Fire is hot.").await, 5.0));
    }

    #[tokio::test]
    async fn failing_backends_drop_their_signals() {
        let judge = CoherenceJudge::new(
            rater("not a number"),
            Some(FakeEmbedder::failing()),
            Some(FakePerplexity::failing()),
            SignalWeights::default(),
        );
        assert_eq!(judge.signals("p", "One. Two.").await, SignalValues::default());
        assert_eq!(judge.score("p", "One. Two.").await, NEUTRAL_COHERENCE);
    }
}
