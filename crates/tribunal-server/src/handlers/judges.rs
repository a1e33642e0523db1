use std::sync::Arc;

use axum::{extract::State, Json};

use tribunal_engine::JudgeAvailability;

use crate::ServerState;

/// Reports which judge backends loaded at startup.
pub async fn availability(State(state): State<Arc<ServerState>>) -> Json<JudgeAvailability> {
    Json(state.availability)
}
