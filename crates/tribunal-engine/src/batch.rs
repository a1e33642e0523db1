//! Batch adapter shared by the HTTP endpoint and the file CLI.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use tribunal_core::{EvaluationItem, EvaluationReport};

use crate::orchestrator::Evaluator;

/// Message returned for any payload that is not a non-empty list.
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input: expected a list of objects";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatchError {
    #[error("{0}")]
    InvalidInput(String),
}

impl BatchError {
    pub fn invalid_input() -> Self {
        BatchError::InvalidInput(INVALID_INPUT_MESSAGE.to_string())
    }
}

/// Validates the top-level payload: it must be a non-empty JSON array.
pub fn parse_batch(payload: Option<Value>) -> Result<Vec<Value>, BatchError> {
    match payload {
        Some(Value::Array(items)) if !items.is_empty() => Ok(items),
        _ => Err(BatchError::invalid_input()),
    }
}

/// Converts raw elements into evaluable items, skipping malformed ones.
pub fn evaluable_items(raw: Vec<Value>) -> Vec<EvaluationItem> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let Value::Object(fields) = value else {
                warn!("Skipping item {}: not an object", index);
                return None;
            };
            let item = EvaluationItem::from_fields(fields);
            match item.pair() {
                Ok(_) => Some(item),
                Err(e) => {
                    warn!("Skipping item {}: {}", index, e);
                    None
                }
            }
        })
        .collect()
}

/// Evaluates items one after another, preserving input order.
pub async fn evaluate_batch(evaluator: &Evaluator, items: Vec<EvaluationItem>) -> Vec<EvaluationReport> {
    let total = items.len();
    let mut reports = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        info!("Evaluating item {}/{}", index + 1, total);
        match evaluator.evaluate_item(item).await {
            Ok(report) => reports.push(report),
            Err(e) => warn!("Skipping item {}: {}", index, e),
        }
    }
    reports
}

/// Validates a raw payload and evaluates every well-formed element.
pub async fn evaluate_payload(evaluator: &Evaluator, payload: Option<Value>) -> Result<Vec<EvaluationReport>, BatchError> {
    let raw = parse_batch(payload)?;
    let received = raw.len();
    let items = evaluable_items(raw);
    info!("Batch: {} received, {} evaluable", received, items.len());
    Ok(evaluate_batch(evaluator, items).await)
}
