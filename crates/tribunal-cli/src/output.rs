//! Report files and console output.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use tribunal_core::EvaluationReport;
use tribunal_engine::{GroupBy, GroupMetrics};

/// Writes reports as a 2-space indented JSON array.
pub fn write_report(path: &Path, reports: &[EvaluationReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))
}

/// Reads a report file, skipping entries that lack judge fields.
pub fn read_report(path: &Path) -> Result<Vec<EvaluationReport>> {
    let content = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let entries: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of reports", path.display()))?;

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let Value::Object(fields) = entry else {
                warn!("Skipping report {}: not an object", index);
                return None;
            };
            EvaluationReport::from_fields(fields)
                .map_err(|e| warn!("Skipping report {}: {}", index, e))
                .ok()
        })
        .collect())
}

/// Pretty JSON of the first report, if any.
pub fn preview(reports: &[EvaluationReport]) -> Result<Option<String>> {
    reports
        .first()
        .map(serde_json::to_string_pretty)
        .transpose()
        .map_err(Into::into)
}

/// Renders metrics as a fixed-width table.
pub fn metrics_table(metrics: &[GroupMetrics], by: GroupBy) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let label = match by {
        GroupBy::Agent => "AGENT",
        GroupBy::Prompt => "PROMPT",
    };
    writeln!(
        out,
        "{:<24} {:>6} {:>12} {:>10} {:>14} {:>10}",
        label, "N", "INSTRUCTION", "COHERENCE", "HALLUCINATION", "COMPOSITE"
    )?;
    for m in metrics {
        let instruction = m.avg_instruction_score.map_or_else(|| "N/A".to_string(), |v| format!("{:.4}", v));
        let composite = m.composite_score.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        writeln!(
            out,
            "{:<24} {:>6} {:>12} {:>10.4} {:>13.1}% {:>10}",
            m.group,
            m.total_responses,
            instruction,
            m.avg_coherence_score,
            m.hallucination_rate * 100.0,
            composite
        )?;
    }
    Ok(out)
}
