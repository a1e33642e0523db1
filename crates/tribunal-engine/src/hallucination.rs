//! Hallucination judge (J2): web retrieval, cross-encoder re-ranking, then NLI.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use tribunal_core::{JudgeError, NliVerdict};
use tribunal_inference::{top_label, ClassifierInput, InferenceError, SequenceClassifier};
use tribunal_search::SearchProvider;

/// Outcome of checking one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct HallucinationCheck {
    pub verdict: NliVerdict,
    pub is_hallucination: bool,
}

impl From<NliVerdict> for HallucinationCheck {
    fn from(verdict: NliVerdict) -> Self {
        Self { is_hallucination: verdict.is_hallucination(), verdict }
    }
}

/// The two models that turn evidence into a verdict. Both must load for
/// the judge to be usable.
#[derive(Clone)]
pub struct EvidenceModels {
    pub reranker: Arc<dyn SequenceClassifier>,
    pub nli: Arc<dyn SequenceClassifier>,
}

pub struct HallucinationJudge {
    models: Option<EvidenceModels>,
    search: Option<Arc<dyn SearchProvider>>,
    max_results: usize,
}

impl HallucinationJudge {
    pub fn new(models: Option<EvidenceModels>, search: Option<Arc<dyn SearchProvider>>, max_results: usize) -> Self {
        Self { models, search, max_results }
    }

    /// Checks `claim` against the most relevant web evidence.
    ///
    /// Fails closed: anything short of an `entailment` label is a hallucination.
    pub async fn check(&self, claim: &str) -> HallucinationCheck {
        let Some(models) = &self.models else {
            debug!("Hallucination judge not loaded");
            return NliVerdict::JudgeUnavailable.into();
        };

        let snippets = match self.retrieve(claim).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("{}", e);
                return NliVerdict::CouldNotRetrieve.into();
            }
        };

        match verify(models, claim, &snippets).await {
            Ok(verdict) => verdict.into(),
            Err(e) => {
                warn!("Hallucination judge inference failed: {}", e);
                NliVerdict::InferenceError.into()
            }
        }
    }

    /// Non-empty web evidence for the claim.
    async fn retrieve(&self, claim: &str) -> Result<Vec<String>, JudgeError> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| JudgeError::RetrievalFailure("no search provider configured".into()))?;

        let snippets: Vec<String> = search
            .search(claim, self.max_results)
            .await?
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .take(self.max_results)
            .collect();

        if snippets.is_empty() {
            return Err(JudgeError::RetrievalFailure(format!("{} returned no evidence", search.name())));
        }
        Ok(snippets)
    }
}

async fn verify(models: &EvidenceModels, claim: &str, snippets: &[String]) -> Result<NliVerdict, JudgeError> {
    let relevance = rerank(models.reranker.as_ref(), claim, snippets).await?;
    let best = best_index(&relevance).unwrap_or(0);
    let evidence = &snippets[best];
    debug!("Best evidence #{} of {} (relevance {:.3})", best, snippets.len(), relevance[best]);

    let scores = models
        .nli
        .classify(ClassifierInput::Pair { text: evidence, text_pair: claim })
        .await?;
    let label = top_label(&scores).ok_or_else(|| JudgeError::ParseError("NLI returned no labels".into()))?;

    info!("NLI verdict: {} ({:.3})", label.label, label.score);
    Ok(NliVerdict::from_label(&label.label))
}

/// Relevance of each snippet to the claim, in snippet order.
async fn rerank(
    reranker: &dyn SequenceClassifier,
    claim: &str,
    snippets: &[String],
) -> Result<Vec<f64>, InferenceError> {
    let futures = snippets
        .iter()
        .map(|snippet| reranker.classify(ClassifierInput::Pair { text: claim, text_pair: snippet }));

    join_all(futures)
        .await
        .into_iter()
        .map(|result| {
            let scores = result?;
            top_label(&scores)
                .map(|s| s.score)
                .ok_or_else(|| InferenceError::InvalidResponse("cross-encoder returned no score".into()))
        })
        .collect()
}

/// Index of the highest score; the first one wins a tie.
fn best_index(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
