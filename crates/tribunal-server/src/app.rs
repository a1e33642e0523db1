//! Router and shared state.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Request, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tribunal_config::{ServerSettings, Settings};
use tribunal_engine::{Evaluator, JudgeAvailability, JudgePanel};

use crate::handlers;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub evaluator: Evaluator,
    pub availability: JudgeAvailability,
}

impl ServerState {
    pub fn new(panel: &JudgePanel, settings: &Settings) -> Self {
        Self { evaluator: panel.evaluator(settings), availability: panel.availability() }
    }
}

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let origin = match settings.client_uri.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => {
            info!("CORS restricted to {:?}", origin);
            AllowOrigin::exact(origin)
        }
        Some(Err(e)) => {
            warn!("Ignoring invalid CLIENT_URI ({}), allowing any origin", e);
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
}

/// Builds the application router.
pub fn router(state: Arc<ServerState>, settings: &ServerSettings) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/api/evaluate", post(handlers::evaluate::evaluate))
        .route("/api/evaluate/", post(handlers::evaluate::evaluate))
        .route("/api/judges", get(handlers::judges::availability))
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors_layer(settings))
        .with_state(state)
}
