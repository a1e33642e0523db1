//! Instruction-following judge (J1).

use std::sync::Arc;

use tracing::{debug, warn};

use tribunal_core::InstructionScore;
use tribunal_inference::{ClassifierInput, SequenceClassifier};

/// Formats a pair the way the instruction classifier was trained on.
pub fn instruction_input(prompt: &str, response: &str) -> String {
    format!("Question: {}\n\nAnswer: {}", prompt, response)
}

/// Scores how well a response follows its prompt with a fine-tuned classifier.
pub struct InstructionJudge {
    classifier: Option<Arc<dyn SequenceClassifier>>,
}

impl InstructionJudge {
    pub fn new(classifier: Option<Arc<dyn SequenceClassifier>>) -> Self {
        Self { classifier }
    }

    /// Returns the raw logit of the classification head, or `Unavailable`.
    pub async fn score(&self, prompt: &str, response: &str) -> InstructionScore {
        let Some(classifier) = &self.classifier else {
            debug!("Instruction judge not loaded");
            return InstructionScore::Unavailable;
        };

        let text = instruction_input(prompt, response);
        match classifier.classify(ClassifierInput::Text(&text)).await {
            Ok(scores) => InstructionScore::from(scores.first().map(|s| s.score)),
            Err(e) => {
                warn!("Instruction judge ({}) failed: {}", classifier.model_id(), e);
                InstructionScore::Unavailable
            }
        }
    }
}
