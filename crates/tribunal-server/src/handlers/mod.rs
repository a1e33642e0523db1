//! HTTP route handlers for the evaluation server.

pub mod evaluate;
pub mod judges;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
