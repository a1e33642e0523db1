//! One-time bootstrap of every judge backend.
//!
//! Each backend is probed once at startup. A backend that fails to load is
//! logged and left as `None`; the judges that depend on it answer with their
//! sentinel for the life of the process.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use tribunal_config::Settings;
use tribunal_core::JudgeError;
use tribunal_inference::{
    Activation, Embedder, HfClassifier, HfEmbedder, InferenceError, PerplexityModel, SequenceClassifier, TgiPerplexity,
};
use tribunal_llm::{ChatClient, CoherenceRater, RetryPolicy};
use tribunal_search::{SearchProvider, TavilySearch};

use crate::coherence::CoherenceJudge;
use crate::hallucination::{EvidenceModels, HallucinationJudge};
use crate::instruction::InstructionJudge;
use crate::orchestrator::Evaluator;

/// Shared, read-only capability handles.
#[derive(Clone, Default)]
pub struct JudgePanel {
    pub instruction: Option<Arc<dyn SequenceClassifier>>,
    pub nli: Option<Arc<dyn SequenceClassifier>>,
    pub cross_encoder: Option<Arc<dyn SequenceClassifier>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub language_model: Option<Arc<dyn PerplexityModel>>,
    pub rater: Option<Arc<CoherenceRater>>,
    pub search: Option<Arc<dyn SearchProvider>>,
}

/// Which capabilities loaded, as reported by `GET /api/judges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JudgeAvailability {
    pub instruction: bool,
    pub hallucination: bool,
    pub coherence_rating: bool,
    pub embedding: bool,
    pub perplexity: bool,
    pub search: bool,
}

impl JudgePanel {
    /// Connects every backend named in `settings`, probing them concurrently.
    pub async fn initialize(settings: &Settings) -> Self {
        let inference = &settings.inference;
        let models = &settings.models;

        info!("╔══════════════════════════════════════════════════════════════");
        info!("║ LOADING JUDGES");
        info!("╠══════════════════════════════════════════════════════════════");

        let (instruction, nli, cross_encoder, embedder, language_model) = tokio::join!(
            HfClassifier::connect(inference, &models.instruction, Activation::None),
            HfClassifier::connect(inference, &models.nli, Activation::Softmax),
            HfClassifier::connect(inference, &models.cross_encoder, Activation::None),
            HfEmbedder::connect(inference, &models.embedding),
            connect_language_model(settings),
        );

        let panel = Self {
            instruction: loaded("J1 instruction", &models.instruction, instruction)
                .map(|c| Arc::new(c) as Arc<dyn SequenceClassifier>),
            nli: loaded("J2 NLI", &models.nli, nli).map(|c| Arc::new(c) as Arc<dyn SequenceClassifier>),
            cross_encoder: loaded("J2 cross-encoder", &models.cross_encoder, cross_encoder)
                .map(|c| Arc::new(c) as Arc<dyn SequenceClassifier>),
            embedder: loaded("J3 embedding", &models.embedding, embedder).map(|e| Arc::new(e) as Arc<dyn Embedder>),
            language_model: language_model.map(|lm| Arc::new(lm) as Arc<dyn PerplexityModel>),
            rater: rating_client(settings),
            search: search_client(settings),
        };

        info!("║ Availability: {:?}", panel.availability());
        info!("╚══════════════════════════════════════════════════════════════");
        panel
    }

    pub fn availability(&self) -> JudgeAvailability {
        JudgeAvailability {
            instruction: self.instruction.is_some(),
            hallucination: self.nli.is_some() && self.cross_encoder.is_some(),
            coherence_rating: self.rater.is_some(),
            embedding: self.embedder.is_some(),
            perplexity: self.language_model.is_some(),
            search: self.search.is_some(),
        }
    }

    /// Builds the evaluator that uses this panel's backends.
    pub fn evaluator(&self, settings: &Settings) -> Evaluator {
        let evidence = match (&self.cross_encoder, &self.nli) {
            (Some(reranker), Some(nli)) => Some(EvidenceModels { reranker: reranker.clone(), nli: nli.clone() }),
            _ => None,
        };

        Evaluator::new(
            InstructionJudge::new(self.instruction.clone()),
            HallucinationJudge::new(evidence, self.search.clone(), settings.search.max_results),
            CoherenceJudge::new(
                self.rater.clone(),
                self.embedder.clone(),
                self.language_model.clone(),
                settings.weights,
            ),
        )
    }
}

fn loaded<T>(role: &str, model_id: &str, result: Result<T, InferenceError>) -> Option<T> {
    match probed(model_id, result) {
        Ok(backend) => {
            info!("║ ✓ {}: {}", role, model_id);
            Some(backend)
        }
        Err(e) => {
            warn!("║ ✗ {}: {}", role, e);
            None
        }
    }
}

fn probed<T>(model_id: &str, result: Result<T, InferenceError>) -> Result<T, JudgeError> {
    result.map_err(|e| JudgeError::ModelUnavailable(format!("{} ({})", model_id, e)))
}

async fn connect_language_model(settings: &Settings) -> Option<TgiPerplexity> {
    let model_id = &settings.models.language_model;
    let Some(tgi_url) = settings.inference.tgi_url.as_deref() else {
        warn!("║ ✗ J3 perplexity: TGI_URL not set, signal disabled");
        return None;
    };
    loaded(
        "J3 perplexity",
        model_id,
        TgiPerplexity::connect(&settings.inference, tgi_url, model_id).await,
    )
}

fn rating_client(settings: &Settings) -> Option<Arc<CoherenceRater>> {
    match ChatClient::from_settings(&settings.rating) {
        Some(client) => {
            info!("║ ✓ J3 rating: {}", settings.rating.model);
            let policy = RetryPolicy::from(&settings.rating);
            Some(Arc::new(CoherenceRater::new(Arc::new(client), policy)))
        }
        None => {
            warn!("║ ✗ J3 rating: GEMINI_API_KEY not set, signal disabled");
            None
        }
    }
}

fn search_client(settings: &Settings) -> Option<Arc<dyn SearchProvider>> {
    match TavilySearch::from_settings(&settings.search) {
        Some(search) => {
            info!("║ ✓ J2 search: tavily");
            Some(Arc::new(search))
        }
        None => {
            warn!("║ ✗ J2 search: TAVILY_API_KEY not set, every claim will be COULD_NOT_RETRIEVE");
            None
        }
    }
}
