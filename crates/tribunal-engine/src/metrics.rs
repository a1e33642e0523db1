//! Aggregate metrics over a set of reports, grouped by agent or prompt.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use tribunal_core::EvaluationReport;

/// Group label used when a report lacks the grouping field.
pub const UNKNOWN_GROUP: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Agent,
    Prompt,
}

impl GroupBy {
    pub fn field(&self) -> &'static str {
        match self {
            GroupBy::Agent => "agent_id",
            GroupBy::Prompt => "prompt_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMetrics {
    pub group: String,
    pub total_responses: usize,
    /// Mean over numeric scores only; `None` when every score is `N/A`.
    pub avg_instruction_score: Option<f64>,
    pub avg_coherence_score: f64,
    pub hallucination_rate: f64,
    /// Agents only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_score: Option<f64>,
    /// Prompt text of the first report in the group; prompts only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// `max(0, (instruction/5 + coherence/5 - 0.5 * hallucination_rate) * 5)`.
///
/// A missing instruction average contributes nothing.
pub fn composite_score(avg_instruction: Option<f64>, avg_coherence: f64, hallucination_rate: f64) -> f64 {
    let instruction = avg_instruction.unwrap_or(0.0) / 5.0;
    ((instruction + avg_coherence / 5.0 - 0.5 * hallucination_rate) * 5.0).max(0.0)
}

fn group_key(report: &EvaluationReport, by: GroupBy) -> String {
    match report.item.get(by.field()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => UNKNOWN_GROUP.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Keeps reports whose agent and prompt are in the given lists; an empty list matches everything.
pub fn filter_reports<'a>(
    reports: &'a [EvaluationReport],
    agents: &[String],
    prompts: &[String],
) -> Vec<&'a EvaluationReport> {
    reports
        .iter()
        .filter(|r| agents.is_empty() || agents.contains(&group_key(r, GroupBy::Agent)))
        .filter(|r| prompts.is_empty() || prompts.contains(&group_key(r, GroupBy::Prompt)))
        .collect()
}

/// Computes metrics per group, ordered by group name.
pub fn summarize<'a>(reports: impl IntoIterator<Item = &'a EvaluationReport>, by: GroupBy) -> Vec<GroupMetrics> {
    let mut groups: BTreeMap<String, Vec<&EvaluationReport>> = BTreeMap::new();
    for report in reports {
        groups.entry(group_key(report, by)).or_default().push(report);
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let n = members.len() as f64;
            let instruction: Vec<f64> = members
                .iter()
                .filter_map(|r| r.judgement.instruction_score.value())
                .collect();
            let avg_instruction_score =
                (!instruction.is_empty()).then(|| instruction.iter().sum::<f64>() / instruction.len() as f64);
            let avg_coherence_score = members.iter().map(|r| r.judgement.coherence_score).sum::<f64>() / n;
            let hallucination_rate = members.iter().filter(|r| r.judgement.is_hallucination).count() as f64 / n;

            let (composite_score, prompt) = match by {
                GroupBy::Agent => (
                    Some(composite_score(avg_instruction_score, avg_coherence_score, hallucination_rate)),
                    None,
                ),
                GroupBy::Prompt => (None, members[0].item.prompt().map(str::to_string)),
            };

            GroupMetrics {
                group,
                total_responses: members.len(),
                avg_instruction_score,
                avg_coherence_score,
                hallucination_rate,
                composite_score,
                prompt,
            }
        })
        .collect()
}
