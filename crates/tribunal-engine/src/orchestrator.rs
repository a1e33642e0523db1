//! Runs the three judges on one item and assembles the report.

use std::time::Instant;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use tribunal_core::{EvaluationItem, EvaluationReport, JudgeError, Judgement};

use crate::coherence::CoherenceJudge;
use crate::hallucination::HallucinationJudge;
use crate::instruction::InstructionJudge;

/// The full judge panel for a single evaluation.
pub struct Evaluator {
    instruction: InstructionJudge,
    hallucination: HallucinationJudge,
    coherence: CoherenceJudge,
}

impl Evaluator {
    pub fn new(instruction: InstructionJudge, hallucination: HallucinationJudge, coherence: CoherenceJudge) -> Self {
        Self { instruction, hallucination, coherence }
    }

    /// Judges one `(prompt, response)` pair.
    ///
    /// The judges run concurrently and none can fail the evaluation; each
    /// degrades to its own sentinel instead.
    pub async fn evaluate(&self, prompt: &str, response: &str) -> Judgement {
        let request_id = Uuid::new_v4();
        let span = info_span!("evaluate", %request_id);

        async {
            let start = Instant::now();
            info!("╔══════════════════════════════════════════════════════════════");
            info!("║ EVALUATE: {}...", prompt.chars().take(50).collect::<String>());

            let (instruction, hallucination, coherence) = tokio::join!(
                self.instruction.score(prompt, response),
                self.hallucination.check(response),
                self.coherence.score(prompt, response),
            );

            let judgement = Judgement::new(instruction, coherence, hallucination.verdict);
            info!("║ J1 instruction: {}", judgement.instruction_score);
            info!("║ J2 hallucination: {} ({})", judgement.is_hallucination, judgement.nli_verdict);
            info!("║ J3 coherence: {:.4}", judgement.coherence_score);
            info!("║ ✓ Completed in {:?}", start.elapsed());
            info!("╚══════════════════════════════════════════════════════════════");
            judgement
        }
        .instrument(span)
        .await
    }

    /// Judges an item, keeping its passthrough fields.
    pub async fn evaluate_item(&self, item: EvaluationItem) -> Result<EvaluationReport, JudgeError> {
        let judgement = {
            let (prompt, response) = item.pair()?;
            self.evaluate(prompt, response).await
        };
        Ok(EvaluationReport::new(item, judgement))
    }
}
