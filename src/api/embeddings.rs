use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;

use crate::auth::client_credential;
use crate::error::BridgeError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct EmbeddingsRequest {
    model: String,
    input: EmbeddingsInput,
    #[serde(default)]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingsInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingsInput {
    fn into_texts(self) -> Vec<String> {
        match self {
            EmbeddingsInput::Single(text) => vec![text],
            EmbeddingsInput::Batch(texts) => texts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    #[serde(default)]
    values: Vec<f64>,
}

/// Translate an embeddings request onto `batchEmbedContents`, a near 1:1
/// field rename with no state machine.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(
    state: Arc<AppState>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, BridgeError> {
    let credential = client_credential(headers)?;
    let source: EmbeddingsRequest = serde_json::from_slice(body)
        .map_err(|err| BridgeError::InvalidInput(format!("invalid request body: {err}")))?;

    let model = source.model;
    let texts = source.input.into_texts();
    let requests: Vec<serde_json::Value> = texts
        .iter()
        .map(|text| {
            let mut request = serde_json::json!({
                "model": format!("models/{model}"),
                "content": {"parts": [{"text": text}]},
            });
            if let Some(dimensions) = source.dimensions {
                request["outputDimensionality"] = dimensions.into();
            }
            request
        })
        .collect();

    let raw = state
        .upstream
        .batch_embed_contents(
            &model,
            &credential,
            &serde_json::json!({ "requests": requests }),
        )
        .await?;
    let parsed: BatchEmbedResponse = serde_json::from_slice(&raw)
        .map_err(|err| BridgeError::Transport(format!("unexpected embeddings payload: {err}")))?;

    let data: Vec<serde_json::Value> = parsed
        .embeddings
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| {
            serde_json::json!({
                "object": "embedding",
                "index": index,
                "embedding": embedding.values,
            })
        })
        .collect();

    Ok(axum::Json(serde_json::json!({
        "object": "list",
        "data": data,
        "model": model,
    }))
    .into_response())
}
