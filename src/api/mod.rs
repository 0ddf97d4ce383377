pub mod chat;
pub mod embeddings;
pub mod health;
pub mod models;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the HTTP surface: the chat-completion front door plus the thin
/// passthrough endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat::handler))
        .route("/v1/models", get(models::handler))
        .route("/v1/embeddings", post(embeddings::handler))
        .route("/health", get(health::handler))
        .with_state(state)
}
