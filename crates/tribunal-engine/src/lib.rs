//! Judges and evaluation orchestration for tribunal.
//!
//! - [`InstructionJudge`] - J1, fine-tuned classifier logit
//! - [`HallucinationJudge`] - J2, web evidence, cross-encoder re-rank, NLI
//! - [`CoherenceJudge`] - J3, blend of LLM rating, similarity and perplexity
//! - [`Evaluator`] - Runs all three judges on a `(prompt, response)` pair
//! - [`JudgePanel`] - Startup bootstrap of every model and client
//! - [`evaluate_payload`] - Batch entry point used by the server and CLI
//! - [`summarize`] - Per-agent / per-prompt report metrics
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tribunal_config::Settings;
//! use tribunal_engine::{evaluate_payload, JudgePanel};
//!
//! let settings = Settings::load()?;
//! let panel = JudgePanel::initialize(&settings).await;
//! let evaluator = panel.evaluator(&settings);
//!
//! let payload = serde_json::json!([{ "prompt": "What is 2+2?", "response": "4" }]);
//! let reports = evaluate_payload(&evaluator, Some(payload)).await?;
//! ```
//!
//! # Failure Model
//!
//! Judges never return errors. A backend that failed its startup probe, or
//! fails at call time, turns into a sentinel: `"N/A"` for J1,
//! `JUDGE_UNAVAILABLE` / `COULD_NOT_RETRIEVE` / `INFERENCE_ERROR` for J2, and a
//! dropped signal for J3. Only a malformed top-level payload is an error.

mod batch;
mod coherence;
mod hallucination;
mod instruction;
mod metrics;
mod orchestrator;
mod panel;
mod similarity;

#[cfg(test)]
mod testing;

pub use batch::{evaluable_items, evaluate_batch, evaluate_payload, parse_batch, BatchError, INVALID_INPUT_MESSAGE};
pub use coherence::{
    blend, normalize_perplexity, normalize_rating, CoherenceJudge, Signal, SignalValues, NEUTRAL_ADJACENT_SIMILARITY,
    NEUTRAL_COHERENCE, PERPLEXITY_CEILING, PERPLEXITY_SENTINEL,
};
pub use hallucination::{EvidenceModels, HallucinationCheck, HallucinationJudge};
pub use instruction::{instruction_input, InstructionJudge};
pub use metrics::{composite_score, filter_reports, summarize, GroupBy, GroupMetrics, UNKNOWN_GROUP};
pub use orchestrator::Evaluator;
pub use panel::{JudgeAvailability, JudgePanel};
pub use similarity::{cosine_similarity, mean_adjacent_similarity, split_sentences};
