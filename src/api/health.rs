use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
pub async fn handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "gembridge is running",
        "upstream": {
            "base_url": config.upstream.base_url,
            "api_version": config.upstream.api_version,
        },
    }))
}
