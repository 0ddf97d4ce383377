use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::client_credential;
use crate::error::BridgeError;
use crate::state::AppState;

/// Fixed `created` value the source protocol expects on model entries; the
/// backend does not report one.
const MODEL_CREATED: u64 = 1_677_610_602;

#[derive(Debug, Deserialize)]
struct ModelsList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// List backend models in the source protocol's shape.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match handle(state, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: Arc<AppState>, headers: &HeaderMap) -> Result<Response, BridgeError> {
    let credential = client_credential(headers)?;
    let raw = state.upstream.list_models(&credential).await?;
    let list: ModelsList = serde_json::from_slice(&raw)
        .map_err(|err| BridgeError::Transport(format!("unexpected models payload: {err}")))?;

    let data: Vec<serde_json::Value> = list
        .models
        .iter()
        .map(|entry| {
            let id = entry.name.strip_prefix("models/").unwrap_or(&entry.name);
            serde_json::json!({
                "id": id,
                "object": "model",
                "created": MODEL_CREATED,
                "owned_by": "google",
            })
        })
        .collect();

    Ok(axum::Json(serde_json::json!({
        "object": "list",
        "data": data,
    }))
    .into_response())
}
