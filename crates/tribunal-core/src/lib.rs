//! Core domain types and error definitions for tribunal.
//!
//! This crate provides the fundamental types shared across the tribunal workspace:
//!
//! - [`JudgeError`] - Error taxonomy for judge and backend failures
//! - [`EvaluationItem`] - A `(prompt, response)` pair plus passthrough fields
//! - [`InstructionScore`] - Raw classifier logit or the `"N/A"` sentinel
//! - [`NliVerdict`] - Entailment label or an explicit failure label
//! - [`Judgement`] - The four judge outputs for one item
//! - [`EvaluationReport`] - An item merged with its judgement
//!
//! # Example
//!
//! ```rust
//! use tribunal_core::{EvaluationItem, EvaluationReport, InstructionScore, Judgement, NliVerdict};
//!
//! let item = EvaluationItem::new("What is 2+2?", "4");
//! let judgement = Judgement::new(InstructionScore::Unavailable, 3.25, NliVerdict::CouldNotRetrieve);
//! let report = EvaluationReport::new(item, judgement);
//!
//! let json = serde_json::to_value(&report).unwrap();
//! assert_eq!(json["instruction_score_J1"], "N/A");
//! assert_eq!(json["is_hallucination_J2"], true);
//! ```

use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Report key for the instruction-following score.
pub const INSTRUCTION_SCORE_KEY: &str = "instruction_score_J1";
/// Report key for the coherence score.
pub const COHERENCE_SCORE_KEY: &str = "coherence_score_J3";
/// Report key for the hallucination flag.
pub const IS_HALLUCINATION_KEY: &str = "is_hallucination_J2";
/// Report key for the NLI verdict label.
pub const NLI_PREDICTION_KEY: &str = "nli_prediction_J2";

/// Lowest coherence score a report can carry.
pub const COHERENCE_MIN: f64 = 1.0;
/// Highest coherence score a report can carry.
pub const COHERENCE_MAX: f64 = 5.0;

/// Errors raised by judges and the backends they call.
///
/// None of these escape the orchestrator: each judge degrades to a sentinel
/// value instead, so callers always receive a complete report.
#[derive(Error, Debug)]
pub enum JudgeError {
    /// A backing model failed its startup probe.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Web search failed or produced no evidence.
    #[error("Evidence retrieval failed: {0}")]
    RetrievalFailure(String),

    /// The external rating API signalled a rate limit.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other external API failure.
    #[error("External API error: {0}")]
    TransientApi(String),

    /// A batch item lacked a required field.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A model returned output that could not be interpreted.
    #[error("Failed to parse model output: {0}")]
    ParseError(String),
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::ParseError(err.to_string())
    }
}

/// Rounds a score to the 4 decimal places used in reports.
pub fn round_score(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// Evaluation Item
// ============================================================================

/// One unit of work: a prompt, the agent's response, and any extra fields.
///
/// Extra fields (`agent_id`, `prompt_id`, ...) are carried through to the
/// report untouched and in their original order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationItem(Map<String, Value>);

impl EvaluationItem {
    /// Creates an item holding only a prompt and a response.
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("prompt".into(), Value::String(prompt.into()));
        fields.insert("response".into(), Value::String(response.into()));
        Self(fields)
    }

    /// Wraps an arbitrary JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Adds or replaces a passthrough field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The prompt text, if present and a string.
    pub fn prompt(&self) -> Option<&str> {
        self.0.get("prompt").and_then(Value::as_str)
    }

    /// The response text, if present and a string.
    pub fn response(&self) -> Option<&str> {
        self.0.get("response").and_then(Value::as_str)
    }

    /// Looks up any field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Names of the required fields that are absent or not strings.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.prompt().is_none() {
            missing.push("prompt");
        }
        if self.response().is_none() {
            missing.push("response");
        }
        missing
    }

    /// Returns `(prompt, response)` when both are usable.
    pub fn pair(&self) -> Result<(&str, &str), JudgeError> {
        match (self.prompt(), self.response()) {
            (Some(prompt), Some(response)) => Ok((prompt, response)),
            _ => Err(JudgeError::MalformedInput(format!(
                "missing {}",
                self.missing_fields().join(", ")
            ))),
        }
    }
}

// ============================================================================
// Judge Outputs
// ============================================================================

/// Output of the instruction-following judge.
///
/// The score is a raw classifier logit on an unbounded scale. `Unavailable`
/// is serialized as `"N/A"` and is never folded into a numeric zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstructionScore {
    /// Raw logit from the classification head.
    Score(f64),
    /// The judge could not produce a score.
    Unavailable,
}

impl InstructionScore {
    /// Sentinel text used when the judge is unavailable.
    pub const SENTINEL: &'static str = "N/A";

    /// Returns the numeric score, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            InstructionScore::Score(v) => Some(*v),
            InstructionScore::Unavailable => None,
        }
    }

    /// Rounds the score (if any) to report precision.
    pub fn rounded(self) -> Self {
        match self {
            InstructionScore::Score(v) => InstructionScore::Score(round_score(v)),
            InstructionScore::Unavailable => InstructionScore::Unavailable,
        }
    }
}

impl From<Option<f64>> for InstructionScore {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => InstructionScore::Score(v),
            _ => InstructionScore::Unavailable,
        }
    }
}

impl fmt::Display for InstructionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionScore::Score(v) => write!(f, "{:.4}", v),
            InstructionScore::Unavailable => f.write_str(Self::SENTINEL),
        }
    }
}

impl Serialize for InstructionScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InstructionScore::Score(v) => serializer.serialize_f64(*v),
            InstructionScore::Unavailable => serializer.serialize_str(Self::SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for InstructionScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(InstructionScore::Score(v)),
            Raw::Text(s) if s == Self::SENTINEL => Ok(InstructionScore::Unavailable),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"{}\", got \"{}\"",
                Self::SENTINEL,
                s
            ))),
        }
    }
}

/// Verdict of the hallucination judge.
///
/// Only [`NliVerdict::Entailment`] counts as grounded; every other label,
/// including the failure labels, marks the claim as a hallucination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NliVerdict {
    /// Evidence supports the claim.
    Entailment,
    /// Evidence neither supports nor contradicts the claim.
    Neutral,
    /// Evidence contradicts the claim.
    Contradiction,
    /// Web search returned no usable evidence.
    CouldNotRetrieve,
    /// NLI or cross-encoder model failed to initialize.
    JudgeUnavailable,
    /// A model call failed while checking the claim.
    InferenceError,
    /// Any other label emitted by the NLI model.
    Other(String),
}

impl NliVerdict {
    /// Maps a raw model label to a verdict. Matching is exact.
    pub fn from_label(label: &str) -> Self {
        match label {
            "entailment" => NliVerdict::Entailment,
            "neutral" => NliVerdict::Neutral,
            "contradiction" => NliVerdict::Contradiction,
            "COULD_NOT_RETRIEVE" => NliVerdict::CouldNotRetrieve,
            "JUDGE_UNAVAILABLE" => NliVerdict::JudgeUnavailable,
            "INFERENCE_ERROR" => NliVerdict::InferenceError,
            other => NliVerdict::Other(other.to_string()),
        }
    }

    /// The label as written in reports.
    pub fn as_str(&self) -> &str {
        match self {
            NliVerdict::Entailment => "entailment",
            NliVerdict::Neutral => "neutral",
            NliVerdict::Contradiction => "contradiction",
            NliVerdict::CouldNotRetrieve => "COULD_NOT_RETRIEVE",
            NliVerdict::JudgeUnavailable => "JUDGE_UNAVAILABLE",
            NliVerdict::InferenceError => "INFERENCE_ERROR",
            NliVerdict::Other(label) => label,
        }
    }

    pub fn is_hallucination(&self) -> bool {
        !matches!(self, NliVerdict::Entailment)
    }
}

impl fmt::Display for NliVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NliVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NliVerdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(NliVerdict::from_label(&label))
    }
}

/// The four judge outputs for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub instruction_score: InstructionScore,
    pub coherence_score: f64,
    pub is_hallucination: bool,
    pub nli_verdict: NliVerdict,
}

impl Judgement {
    /// Builds a judgement, deriving the hallucination flag from the verdict
    /// and rounding scores to report precision.
    pub fn new(instruction_score: InstructionScore, coherence_score: f64, nli_verdict: NliVerdict) -> Self {
        Self {
            instruction_score: instruction_score.rounded(),
            coherence_score: round_score(coherence_score.clamp(COHERENCE_MIN, COHERENCE_MAX)),
            is_hallucination: nli_verdict.is_hallucination(),
            nli_verdict,
        }
    }
}

// ============================================================================
// Evaluation Report
// ============================================================================

/// An evaluation item merged with its judgement.
///
/// Serializes as a flat JSON object: the item's fields in order, with the
/// four judge keys written last unless the item already had a field of the
/// same name, in which case the judge value replaces it in place.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub item: EvaluationItem,
    pub judgement: Judgement,
}

impl EvaluationReport {
    pub fn new(item: EvaluationItem, judgement: Judgement) -> Self {
        Self { item, judgement }
    }

    /// Flattens the report into a single JSON object.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.item.fields().clone();
        let j = &self.judgement;
        let instruction = match j.instruction_score {
            InstructionScore::Score(v) => Value::from(v),
            InstructionScore::Unavailable => Value::from(InstructionScore::SENTINEL),
        };
        fields.insert(INSTRUCTION_SCORE_KEY.into(), instruction);
        fields.insert(COHERENCE_SCORE_KEY.into(), Value::from(j.coherence_score));
        fields.insert(IS_HALLUCINATION_KEY.into(), Value::Bool(j.is_hallucination));
        fields.insert(NLI_PREDICTION_KEY.into(), Value::from(j.nli_verdict.as_str()));
        fields
    }

    /// Recovers a report from a flattened JSON object (e.g. a results file).
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, JudgeError> {
        let mut take = |key: &str| {
            fields
                .shift_remove(key)
                .ok_or_else(|| JudgeError::ParseError(format!("report is missing '{}'", key)))
        };

        let instruction_score: InstructionScore = serde_json::from_value(take(INSTRUCTION_SCORE_KEY)?)?;
        let coherence_score: f64 = serde_json::from_value(take(COHERENCE_SCORE_KEY)?)?;
        let is_hallucination: bool = serde_json::from_value(take(IS_HALLUCINATION_KEY)?)?;
        let nli_verdict: NliVerdict = serde_json::from_value(take(NLI_PREDICTION_KEY)?)?;

        Ok(Self {
            item: EvaluationItem::from_fields(fields),
            judgement: Judgement {
                instruction_score,
                coherence_score,
                is_hallucination,
                nli_verdict,
            },
        })
    }
}

impl Serialize for EvaluationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.to_fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EvaluationReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::deserialize(deserializer)?;
        EvaluationReport::from_fields(fields).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_requires_string_prompt_and_response() {
        let item: EvaluationItem = serde_json::from_value(json!({"response": "no prompt field"})).unwrap();
        assert_eq!(item.missing_fields(), vec!["prompt"]);
        assert!(item.pair().is_err());

        let item: EvaluationItem = serde_json::from_value(json!({"prompt": 7, "response": "x"})).unwrap();
        assert_eq!(item.missing_fields(), vec!["prompt"]);

        let item = EvaluationItem::new("p", "r");
        assert_eq!(item.pair().unwrap(), ("p", "r"));
    }

    #[test]
    fn unavailable_instruction_score_serializes_as_sentinel() {
        assert_eq!(serde_json::to_value(InstructionScore::Unavailable).unwrap(), json!("N/A"));
        assert_eq!(serde_json::to_value(InstructionScore::Score(0.0)).unwrap(), json!(0.0));

        let parsed: InstructionScore = serde_json::from_value(json!("N/A")).unwrap();
        assert_eq!(parsed, InstructionScore::Unavailable);
        assert!(serde_json::from_value::<InstructionScore>(json!("zero")).is_err());
    }

    #[test]
    fn non_finite_scores_become_unavailable() {
        assert_eq!(InstructionScore::from(Some(f64::NAN)), InstructionScore::Unavailable);
        assert_eq!(InstructionScore::from(None), InstructionScore::Unavailable);
        assert_eq!(InstructionScore::from(Some(-1.5)), InstructionScore::Score(-1.5));
    }

    #[test]
    fn only_entailment_is_grounded() {
        assert!(!NliVerdict::from_label("entailment").is_hallucination());
        for label in ["neutral", "contradiction", "ENTAILMENT", "COULD_NOT_RETRIEVE", "LABEL_0"] {
            assert!(NliVerdict::from_label(label).is_hallucination(), "{label}");
        }
        assert_eq!(NliVerdict::from_label("LABEL_0").as_str(), "LABEL_0");
    }

    #[test]
    fn judgement_rounds_and_clamps() {
        let j = Judgement::new(InstructionScore::Score(1.234_567_8), 3.141_592_6, NliVerdict::Entailment);
        assert_eq!(j.instruction_score, InstructionScore::Score(1.2346));
        assert_eq!(j.coherence_score, 3.1416);
        assert!(!j.is_hallucination);

        let j = Judgement::new(InstructionScore::Unavailable, 9.0, NliVerdict::Neutral);
        assert_eq!(j.coherence_score, COHERENCE_MAX);
        assert!(j.is_hallucination);
    }

    #[test]
    fn report_merges_fields_in_order() {
        let item: EvaluationItem = serde_json::from_value(json!({
            "agent_id": "a1",
            "prompt": "What is 2+2?",
            "coherence_score_J3": "stale",
            "response": "4",
        }))
        .unwrap();
        let report = EvaluationReport::new(
            item,
            Judgement::new(InstructionScore::Score(2.5), 4.0, NliVerdict::Contradiction),
        );

        let fields = report.to_fields();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "agent_id",
                "prompt",
                "coherence_score_J3",
                "response",
                "instruction_score_J1",
                "is_hallucination_J2",
                "nli_prediction_J2",
            ]
        );
        assert_eq!(fields["coherence_score_J3"], json!(4.0));
        assert_eq!(fields["nli_prediction_J2"], json!("contradiction"));
    }

    #[test]
    fn reading_a_report_keeps_passthrough_order() {
        let value = json!({
            "prompt": "p",
            "response": "r",
            "agent_id": "a",
            "extra": 1,
            "instruction_score_J1": 0.75,
            "coherence_score_J3": 3.5,
            "is_hallucination_J2": false,
            "nli_prediction_J2": "entailment"
        });
        let report = EvaluationReport::from_fields(value.as_object().unwrap().clone()).unwrap();
        let keys: Vec<&str> = report.item.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["prompt", "response", "agent_id", "extra"]);

        let written: Vec<String> = report.to_fields().keys().cloned().collect();
        let original: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(written, original);
    }

    #[test]
    fn report_reads_back_from_results_file_shape() {
        let value = json!({
            "prompt": "p",
            "response": "r",
            "agent_id": "a",
            "instruction_score_J1": "N/A",
            "coherence_score_J3": 2.5,
            "is_hallucination_J2": true,
            "nli_prediction_J2": "COULD_NOT_RETRIEVE"
        });
        let report: EvaluationReport = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(report.judgement.instruction_score, InstructionScore::Unavailable);
        assert_eq!(report.judgement.nli_verdict, NliVerdict::CouldNotRetrieve);
        assert_eq!(report.item.get("agent_id"), Some(&json!("a")));
        assert_eq!(serde_json::to_value(&report).unwrap(), value);

        let keys: Vec<&str> = report.item.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["prompt", "response", "agent_id"]);

        let incomplete = json!({"prompt": "p", "response": "r"});
        assert!(serde_json::from_value::<EvaluationReport>(incomplete).is_err());
    }
}
