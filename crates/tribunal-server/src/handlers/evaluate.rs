//! Batch evaluation endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::warn;

use tribunal_core::EvaluationReport;
use tribunal_engine::evaluate_payload;

use crate::error::AppError;
use crate::ServerState;

/// Evaluates a JSON array of `{prompt, response, ...}` objects.
///
/// The body is read raw so that malformed JSON gets the same 400 reply as
/// a well-formed payload of the wrong shape.
pub async fn evaluate(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Vec<EvaluationReport>>, AppError> {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Rejecting request body: {}", e);
            None
        }
    };
    let reports = evaluate_payload(&state.evaluator, payload).await?;
    Ok(Json(reports))
}
